//! Resumable HTTP transfer of a single archive file.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{Credentials, FileDescriptor};

use super::checksum::{hash_file, ChecksumAlgorithm, ChecksumVerifier};
use super::error::TransferError;

/// Suffix for in-flight transfers. Partial bytes only ever live under this
/// name; the final filename appears atomically after verification.
const PART_SUFFIX: &str = ".part";

/// Connect timeout for download requests.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default window without progress before a transfer counts as stalled.
///
/// Deliberately distinct from a total-transfer timeout: a multi-gigabyte
/// capture may take hours, but it must keep moving.
const DEFAULT_STALL_TIMEOUT_SECS: u64 = 60;

/// Buffer size for hashing a partial file before resuming (64KB).
const SEED_BUFFER_SIZE: usize = 64 * 1024;

/// Progress callback: `(descriptor id, bytes so far, expected size)`.
pub type TransferProgress = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// Result of a successful download call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was transferred (possibly resumed) and verified.
    Completed {
        bytes: u64,
        algorithm: ChecksumAlgorithm,
        checksum: String,
    },
    /// The final file already existed with a matching digest; nothing was
    /// transferred.
    AlreadyComplete {
        bytes: u64,
        algorithm: ChecksumAlgorithm,
        checksum: String,
    },
}

impl DownloadOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Completed { bytes, .. } | Self::AlreadyComplete { bytes, .. } => *bytes,
        }
    }

    pub fn checksum(&self) -> (&ChecksumAlgorithm, &str) {
        match self {
            Self::Completed {
                algorithm, checksum, ..
            }
            | Self::AlreadyComplete {
                algorithm, checksum, ..
            } => (algorithm, checksum),
        }
    }
}

/// Downloads one descriptor to local storage.
///
/// Supports byte-range resume of a partial `.part` file, streams every
/// chunk through a [`ChecksumVerifier`], and renames to the final name
/// only after the digest matches. Mid-stream failures preserve the partial
/// file so the next attempt resumes instead of restarting.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    client: reqwest::Client,
    credentials: Option<Credentials>,
    stall_timeout: Duration,
}

impl FileDownloader {
    /// Create a downloader, optionally authenticating every request.
    ///
    /// The internal client has a connect timeout but no total-request
    /// timeout; the stall window bounds a silent transfer instead.
    pub fn new(credentials: Option<Credentials>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            credentials,
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
        }
    }

    /// Override the stall window.
    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Download `descriptor` into `dest_dir`.
    ///
    /// Locations are tried in order; a non-retryable refusal from one
    /// mirror falls through to the next, while transient errors surface
    /// immediately so the coordinator's retry policy governs them.
    pub async fn download(
        &self,
        descriptor: &FileDescriptor,
        dest_dir: &Path,
        cancel: &CancellationToken,
        progress: Option<&TransferProgress>,
    ) -> Result<DownloadOutcome, TransferError> {
        validate_filename(descriptor)?;

        let (algorithm, expected) = ChecksumAlgorithm::preferred(&descriptor.checksums)
            .ok_or_else(|| TransferError::UnsupportedChecksum {
                filename: descriptor.filename.clone(),
                declared: descriptor.checksums.keys().cloned().collect(),
            })?;

        let final_path = dest_dir.join(&descriptor.filename);
        let temp_path = dest_dir.join(format!("{}{}", descriptor.filename, PART_SUFFIX));

        // A finished file may predate its manifest entry (crash between
        // rename and ledger append); verify it directly before touching
        // the network.
        if let Some(outcome) = self
            .check_existing(descriptor, &final_path, algorithm, &expected)
            .await?
        {
            return Ok(outcome);
        }

        if descriptor.locations.is_empty() {
            return Err(TransferError::InvalidDescriptor {
                filename: descriptor.filename.clone(),
                reason: "descriptor lists no download locations".to_string(),
            });
        }

        let mut last_refusal = None;
        for location in &descriptor.locations {
            match self
                .transfer(
                    descriptor, location, &temp_path, &final_path, algorithm, &expected, cancel,
                    progress,
                )
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(err @ TransferError::Denied { .. }) => {
                    warn!(
                        filename = %descriptor.filename,
                        error = %err,
                        "location refused download, trying next"
                    );
                    last_refusal = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_refusal.expect("at least one location was tried"))
    }

    /// Short-circuit when the final file is already present and verified.
    async fn check_existing(
        &self,
        descriptor: &FileDescriptor,
        final_path: &Path,
        algorithm: ChecksumAlgorithm,
        expected: &str,
    ) -> Result<Option<DownloadOutcome>, TransferError> {
        let meta = match fs::metadata(final_path).await {
            Ok(meta) => meta,
            Err(_) => return Ok(None),
        };

        if meta.len() == descriptor.size {
            let actual = hash_file(final_path, algorithm)
                .await
                .map_err(|e| TransferError::Io {
                    path: final_path.to_path_buf(),
                    source: e,
                })?;
            if actual == expected {
                debug!(filename = %descriptor.filename, "already present and verified");
                return Ok(Some(DownloadOutcome::AlreadyComplete {
                    bytes: meta.len(),
                    algorithm,
                    checksum: actual,
                }));
            }
        }

        // Wrong size or wrong digest: the name is lying. Remove it so the
        // fresh transfer can claim it.
        warn!(
            filename = %descriptor.filename,
            "existing file fails verification, re-downloading"
        );
        fs::remove_file(final_path)
            .await
            .map_err(|e| TransferError::Io {
                path: final_path.to_path_buf(),
                source: e,
            })?;
        Ok(None)
    }

    #[allow(clippy::too_many_arguments)]
    async fn transfer(
        &self,
        descriptor: &FileDescriptor,
        location: &str,
        temp_path: &Path,
        final_path: &Path,
        algorithm: ChecksumAlgorithm,
        expected: &str,
        cancel: &CancellationToken,
        progress: Option<&TransferProgress>,
    ) -> Result<DownloadOutcome, TransferError> {
        let offset = match fs::metadata(temp_path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        let mut request = self.client.get(location);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            response = request.send() => response.map_err(|e| TransferError::Transient {
                url: location.to_string(),
                reason: e.to_string(),
            })?,
        };

        let status = response.status();
        let resuming = match status {
            StatusCode::OK => false,
            StatusCode::PARTIAL_CONTENT => {
                let start = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range_start);
                match start {
                    Some(start) if start == offset => true,
                    Some(0) | None if offset == 0 => false,
                    other => {
                        // The server honored Range but from the wrong
                        // offset; appending its body would corrupt the
                        // file. Drop the partial and let the retry start
                        // clean.
                        warn!(
                            filename = %descriptor.filename,
                            requested = offset,
                            got = ?other,
                            "unexpected resume offset, restarting from zero"
                        );
                        let _ = fs::remove_file(temp_path).await;
                        return Err(TransferError::Transient {
                            url: location.to_string(),
                            reason: "server returned an unexpected resume offset".to_string(),
                        });
                    }
                }
            }
            s if s.as_u16() == 408 || s.as_u16() == 429 || s.is_server_error() => {
                return Err(TransferError::Transient {
                    url: location.to_string(),
                    reason: format!("HTTP {}", s),
                });
            }
            s => {
                return Err(TransferError::Denied {
                    url: location.to_string(),
                    status: s.as_u16(),
                });
            }
        };

        if offset > 0 && !resuming {
            debug!(
                filename = %descriptor.filename,
                offset,
                "server ignored range request, restarting from zero"
            );
        }

        let (mut verifier, mut file, mut written) = if resuming {
            let verifier = seed_verifier(temp_path, algorithm).await?;
            let file = OpenOptions::new()
                .append(true)
                .open(temp_path)
                .await
                .map_err(|e| TransferError::Io {
                    path: temp_path.to_path_buf(),
                    source: e,
                })?;
            (verifier, file, offset)
        } else {
            let file = File::create(temp_path)
                .await
                .map_err(|e| TransferError::Io {
                    path: temp_path.to_path_buf(),
                    source: e,
                })?;
            (ChecksumVerifier::new(algorithm), file, 0)
        };

        let mut stream = response.bytes_stream();
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = file.flush().await;
                    return Err(TransferError::Cancelled);
                }
                item = timeout(self.stall_timeout, stream.next()) => item,
            };

            match item {
                Err(_) => {
                    let _ = file.flush().await;
                    return Err(TransferError::Stalled {
                        url: location.to_string(),
                        stalled_secs: self.stall_timeout.as_secs(),
                    });
                }
                Ok(None) => break,
                Ok(Some(Err(err))) => {
                    let _ = file.flush().await;
                    return Err(TransferError::Transient {
                        url: location.to_string(),
                        reason: err.to_string(),
                    });
                }
                Ok(Some(Ok(chunk))) => {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| TransferError::Io {
                            path: temp_path.to_path_buf(),
                            source: e,
                        })?;
                    verifier.update(&chunk);
                    written += chunk.len() as u64;
                    if let Some(callback) = progress {
                        callback(descriptor.id(), written, descriptor.size);
                    }
                }
            }
        }

        file.flush().await.map_err(|e| TransferError::Io {
            path: temp_path.to_path_buf(),
            source: e,
        })?;
        file.sync_all().await.map_err(|e| TransferError::Io {
            path: temp_path.to_path_buf(),
            source: e,
        })?;
        drop(file);

        // A short body is a truncated stream, not corruption: keep the
        // partial so the next attempt resumes from here.
        if written < descriptor.size {
            return Err(TransferError::Transient {
                url: location.to_string(),
                reason: format!(
                    "stream ended early ({written} of {} bytes)",
                    descriptor.size
                ),
            });
        }

        let actual = verifier.finalize_hex();
        if actual != expected {
            let _ = fs::remove_file(temp_path).await;
            return Err(TransferError::ChecksumMismatch {
                filename: descriptor.filename.clone(),
                algorithm: algorithm.as_str().to_string(),
                expected: expected.to_string(),
                actual,
            });
        }

        fs::rename(temp_path, final_path)
            .await
            .map_err(|e| TransferError::Io {
                path: final_path.to_path_buf(),
                source: e,
            })?;

        debug!(
            filename = %descriptor.filename,
            bytes = written,
            algorithm = %algorithm,
            "download verified"
        );
        Ok(DownloadOutcome::Completed {
            bytes: written,
            algorithm,
            checksum: actual,
        })
    }
}

/// Descriptors name plain files; anything path-like is hostile.
fn validate_filename(descriptor: &FileDescriptor) -> Result<(), TransferError> {
    let name = &descriptor.filename;
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
        return Err(TransferError::InvalidDescriptor {
            filename: name.clone(),
            reason: "filename must not contain path separators".to_string(),
        });
    }
    Ok(())
}

/// Rebuild the verifier state from an existing partial file.
///
/// Resuming appends to the temp file, so the digest must first absorb
/// every byte already on disk.
async fn seed_verifier(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumVerifier, TransferError> {
    let mut file = File::open(path).await.map_err(|e| TransferError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut verifier = ChecksumVerifier::new(algorithm);
    let mut buffer = vec![0u8; SEED_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).await.map_err(|e| TransferError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if read == 0 {
            break;
        }
        verifier.update(&buffer[..read]);
    }
    Ok(verifier)
}

/// Pull the start offset out of a `Content-Range: bytes 100-199/5000`
/// header.
fn parse_content_range_start(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = rest.split_once('-')?;
    start.trim().parse().ok()
}
