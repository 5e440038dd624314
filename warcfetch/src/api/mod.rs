//! WASAPI inventory API client.
//!
//! This module talks to the paginated "webdata" endpoint of a WASAPI access
//! point and turns its responses into file descriptors:
//!
//! - Query construction (`filter`)
//! - Response models (`types`)
//! - HTTP client with auth and page-level retry (`client`)
//! - Lazy cursor-driven page walking (`pager`)
//!
//! Pagination is inherently sequential: each page's `next` URL comes from
//! the previous response, so enumeration is a single forward-only pull
//! stream consumed by the download coordinator.

mod client;
mod error;
mod filter;
mod pager;
mod types;

pub use client::{Credentials, InventoryClient};
pub use error::FetchError;
pub use filter::QueryFilter;
pub use pager::DescriptorPager;
pub use types::{FileDescriptor, PageResult};
