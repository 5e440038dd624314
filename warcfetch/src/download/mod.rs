//! Transfer engine for archive files.
//!
//! This module downloads the files an inventory enumeration yields:
//!
//! - Streaming checksum verification (`checksum`)
//! - Resumable single-file HTTP transfer (`http`)
//! - Per-file task state machine (`task`)
//! - Retry/backoff policy (`policy`)
//! - Durable completion ledger (`manifest`)
//! - Run aggregation (`report`)
//! - Bounded-concurrency orchestration (`coordinator`)
//!
//! # Architecture
//!
//! ```text
//! DownloadCoordinator
//!         │
//!         ├── DescriptorPager ──► bounded dispatch queue
//!         │
//!         ├── worker pool (semaphore of size `concurrency`)
//!         │       └── FileDownloader ──► ChecksumVerifier
//!         │
//!         ├── ManifestStore (append-only JSONL ledger)
//!         │
//!         └── RunReport
//! ```
//!
//! Enumeration and transfer run concurrently: workers start on the first
//! page's files while later pages are still being fetched. Memory is
//! bounded by the dispatch queue, not by the result-set size.

mod checksum;
mod coordinator;
mod error;
mod http;
mod manifest;
mod policy;
mod report;
mod task;

pub use checksum::{ChecksumAlgorithm, ChecksumVerifier};
pub use coordinator::{CoordinatorConfig, DownloadCoordinator};
pub use error::{FailureClass, RunError, TransferError};
pub use http::{DownloadOutcome, FileDownloader, TransferProgress};
pub use manifest::{ManifestEntry, ManifestStore};
pub use policy::RetryPolicy;
pub use report::{FailedFile, RunReport};
pub use task::{DownloadTask, TaskStatus};
