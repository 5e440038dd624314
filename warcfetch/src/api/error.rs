//! Error types for inventory enumeration.

use thiserror::Error;

/// Errors surfaced while enumerating the inventory API.
///
/// A fetch error aborts enumeration for the run: silently skipping a bad
/// page could hide an unbounded number of files, so the coordinator never
/// papers over one.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Could not reach the access point at all.
    #[error("could not connect to {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The access point rejected our credentials.
    #[error("authentication rejected for {url} (HTTP {status}); verify user/password")]
    Auth { url: String, status: u16 },

    /// The access point answered with an unexpected status.
    #[error("unexpected HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body was not a well-formed inventory page.
    #[error("malformed inventory response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    /// Whether a page-level retry may succeed.
    ///
    /// Auth failures and malformed bodies are deterministic; only network
    /// errors and server-side (5xx/429/408) statuses are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Status { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            Self::Auth { .. } | Self::Malformed { .. } => false,
        }
    }
}
