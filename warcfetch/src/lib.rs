//! warcfetch - Bulk retrieval engine for WASAPI web-archive inventories
//!
//! This library implements the core of a bulk download client for
//! WASAPI-style web-archive APIs: it enumerates archive files (WARC/WACZ
//! captures) across paginated inventory responses and transfers each file to
//! local storage with checksum verification, byte-range resume, bounded
//! concurrency and a durable completion manifest.
//!
//! # Architecture
//!
//! ```text
//! QueryFilter ──► InventoryClient ──► DescriptorPager
//!                                           │ (lazy pages)
//!                                           ▼
//!                                  DownloadCoordinator
//!                                   │              │
//!                                   ▼              ▼
//!                            FileDownloader   ManifestStore
//!                                   │              │
//!                            ChecksumVerifier   RunReport
//! ```
//!
//! The library never inspects archive contents; it deals purely in
//! file-level transfer and pagination. Argument parsing, credential prompts
//! and progress rendering live in the companion CLI crate.

pub mod api;
pub mod config;
pub mod download;

pub use api::{
    Credentials, DescriptorPager, FetchError, FileDescriptor, InventoryClient, PageResult,
    QueryFilter,
};
pub use config::ConfigFile;
pub use download::{
    ChecksumAlgorithm, ChecksumVerifier, CoordinatorConfig, DownloadCoordinator, DownloadOutcome,
    FailedFile, FileDownloader, ManifestEntry, ManifestStore, RetryPolicy, RunError, RunReport,
    TransferError, TransferProgress,
};
