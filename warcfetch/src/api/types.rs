//! Response models for the WASAPI webdata endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata for one downloadable archive file, as reported by the API.
///
/// Immutable once received from a page. The `filename` is the descriptor's
/// identity: WASAPI access points guarantee it is unique within an account,
/// and it doubles as the local target name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Server-assigned filename; unique within a query result set.
    pub filename: String,

    /// Expected size in bytes. Zero-byte files are legitimate.
    #[serde(default)]
    pub size: u64,

    /// Declared checksums, keyed by algorithm name (e.g. "sha1", "md5").
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,

    /// Download URLs. Access points may publish several mirror locations;
    /// they are tried in order.
    #[serde(default)]
    pub locations: Vec<String>,

    /// Collection the file belongs to (opaque passthrough).
    #[serde(default)]
    pub collection: Option<u64>,

    /// Crawl job that produced the file (opaque passthrough).
    #[serde(default)]
    pub crawl: Option<u64>,

    /// Capture timestamp reported by the access point (opaque passthrough).
    #[serde(rename = "crawl-time", default)]
    pub crawl_time: Option<String>,

    /// Crawl job start time (opaque passthrough).
    #[serde(rename = "crawl-start", default)]
    pub crawl_start: Option<String>,
}

impl FileDescriptor {
    /// The descriptor's identity within a run.
    pub fn id(&self) -> &str {
        &self.filename
    }
}

/// One page of the paginated inventory listing.
///
/// Transient: consumed by the pager, never retained. A missing `next` URL
/// signals the end of the sequence.
#[derive(Debug, Clone, Deserialize)]
pub struct PageResult {
    /// Total number of matching files across all pages, when reported.
    #[serde(default)]
    pub count: Option<u64>,

    /// URL of the next page, already carrying the query parameters.
    #[serde(default)]
    pub next: Option<String>,

    /// Files listed on this page, in server order.
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
}
