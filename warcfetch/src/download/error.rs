//! Error types for file transfer and run orchestration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::api::FetchError;

use super::report::RunReport;

/// How the coordinator should react to a transfer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying with backoff (network/disk hiccup, stall).
    Transient,
    /// Retried at most once more; a second mismatch is terminal.
    Mismatch,
    /// Failed immediately (auth, not-found, unsupported algorithm).
    Fatal,
    /// The run was cancelled; not an error of the file itself.
    Cancelled,
}

/// Errors from transferring a single file.
///
/// Contained to the file's task: they land in the run report rather than
/// aborting the run.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level failure mid-transfer. The temp file is preserved so a
    /// retry can resume.
    #[error("transfer interrupted for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// No bytes arrived within the stall window.
    #[error("transfer of {url} stalled for {stalled_secs}s")]
    Stalled { url: String, stalled_secs: u64 },

    /// Disk-level failure while writing or reading local files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The computed digest did not match the descriptor's declaration.
    /// The temp file has been discarded: a corrupted stream must not be
    /// resumed.
    #[error("checksum mismatch for {filename} ({algorithm}): expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// Every location refused the request with a non-retryable status.
    #[error("download denied for {url} (HTTP {status})")]
    Denied { url: String, status: u16 },

    /// The descriptor declares no checksum algorithm we can compute.
    #[error("no supported checksum algorithm for {filename} (declared: {declared:?})")]
    UnsupportedChecksum {
        filename: String,
        declared: Vec<String>,
    },

    /// The descriptor cannot be downloaded as given.
    #[error("invalid descriptor {filename}: {reason}")]
    InvalidDescriptor { filename: String, reason: String },

    /// The run's cancellation token fired mid-transfer.
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Classify the error for retry handling.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Transient { .. } | Self::Stalled { .. } | Self::Io { .. } => {
                FailureClass::Transient
            }
            Self::ChecksumMismatch { .. } => FailureClass::Mismatch,
            Self::Denied { .. }
            | Self::UnsupportedChecksum { .. }
            | Self::InvalidDescriptor { .. } => FailureClass::Fatal,
            Self::Cancelled => FailureClass::Cancelled,
        }
    }
}

/// Errors that abort an entire run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Page enumeration failed after transient retries. Skipping the bad
    /// page could hide an unbounded number of files, so the run stops;
    /// the report covers what finished before the abort.
    #[error("enumeration aborted: {source}")]
    Enumeration {
        #[source]
        source: FetchError,
        partial: RunReport,
    },

    /// The destination directory could not be prepared.
    #[error("cannot use destination {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = TransferError::Transient {
            url: "http://example.com/a".to_string(),
            reason: "connection reset".to_string(),
        };
        assert_eq!(err.class(), FailureClass::Transient);

        let err = TransferError::ChecksumMismatch {
            filename: "a.warc.gz".to_string(),
            algorithm: "sha1".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(err.class(), FailureClass::Mismatch);

        let err = TransferError::Denied {
            url: "http://example.com/a".to_string(),
            status: 404,
        };
        assert_eq!(err.class(), FailureClass::Fatal);

        assert_eq!(TransferError::Cancelled.class(), FailureClass::Cancelled);
    }

    #[test]
    fn test_stall_is_transient() {
        let err = TransferError::Stalled {
            url: "http://example.com/a".to_string(),
            stalled_secs: 60,
        };
        assert_eq!(err.class(), FailureClass::Transient);
    }
}
