//! Bounded-concurrency orchestration of an enumeration-and-download run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{DescriptorPager, FileDescriptor, InventoryClient, QueryFilter};

use super::error::{FailureClass, RunError};
use super::http::{DownloadOutcome, FileDownloader, TransferProgress};
use super::manifest::{ManifestEntry, ManifestStore};
use super::policy::RetryPolicy;
use super::report::RunReport;
use super::task::DownloadTask;

/// Default worker pool size.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default dispatch queue capacity.
///
/// Memory during a run is bounded by this queue, not by the size of the
/// result set: enumeration blocks once the queue is full.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Extra attempts allowed after a checksum mismatch.
pub const DEFAULT_CHECKSUM_RETRIES: u32 = 1;

/// Default window without transfer progress before a worker gives up.
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 60;

/// Tunables for a coordinator run.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum simultaneous transfers.
    pub concurrency: usize,
    /// Dispatch queue capacity between enumeration and the worker pool.
    pub queue_capacity: usize,
    /// Retry policy for transient per-file failures.
    pub retry: RetryPolicy,
    /// Extra attempts after a checksum mismatch (a single re-try covers
    /// transient corruption; persistent mismatch is a real failure).
    pub checksum_retries: u32,
    /// Per-transfer stall window.
    pub stall_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry: RetryPolicy::default(),
            checksum_retries: DEFAULT_CHECKSUM_RETRIES,
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
        }
    }
}

/// How a settled worker left its task.
#[derive(Debug)]
enum WorkerOutcome {
    /// Verified and recorded; `bytes` is what this run actually wrote.
    Completed { bytes: u64 },
    /// Retry budget exhausted; details live on the task.
    Failed,
    /// Interrupted by cancellation; not counted either way.
    Cancelled,
}

/// Drives enumeration and transfer for one run.
///
/// Downloads begin as soon as the first page arrives; pages keep being
/// fetched while workers transfer earlier files. Files already recorded in
/// the manifest are counted as skipped without touching the network.
///
/// # Example
///
/// ```ignore
/// use warcfetch::{CoordinatorConfig, DownloadCoordinator, InventoryClient,
///                 ManifestStore, QueryFilter};
///
/// let client = InventoryClient::new("https://partner.archive-it.org/wasapi/v1/webdata")?;
/// let manifest = ManifestStore::open("downloads/manifest.jsonl")?;
/// let coordinator = DownloadCoordinator::new(
///     client,
///     "downloads",
///     manifest.into(),
///     CoordinatorConfig::default(),
/// );
///
/// let report = coordinator.run(&QueryFilter::new().with_collection("5425")).await?;
/// println!("completed: {}", report.completed);
/// ```
pub struct DownloadCoordinator {
    client: InventoryClient,
    downloader: FileDownloader,
    manifest: Arc<ManifestStore>,
    destination: PathBuf,
    config: CoordinatorConfig,
    cancel: CancellationToken,
    progress: Option<TransferProgress>,
}

impl DownloadCoordinator {
    /// Create a coordinator writing into `destination`.
    pub fn new(
        client: InventoryClient,
        destination: impl Into<PathBuf>,
        manifest: Arc<ManifestStore>,
        config: CoordinatorConfig,
    ) -> Self {
        let downloader = FileDownloader::new(client.credentials().cloned())
            .with_stall_timeout(config.stall_timeout);
        Self {
            client,
            downloader,
            manifest,
            destination: destination.into(),
            config,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Install a transfer progress callback.
    pub fn with_progress(mut self, progress: TransferProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Token that stops the run when cancelled: no new dispatches, in-flight
    /// transfers interrupted cleanly with their partials preserved.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the full enumeration-and-download pipeline.
    ///
    /// Per-file failures are contained in the returned report; only an
    /// enumeration failure (or an unusable destination) aborts the run.
    pub async fn run(&self, filter: &QueryFilter) -> Result<RunReport, RunError> {
        tokio::fs::create_dir_all(&self.destination)
            .await
            .map_err(|e| RunError::Destination {
                path: self.destination.clone(),
                source: e,
            })?;

        let (queue_tx, mut queue_rx) = mpsc::channel::<FileDescriptor>(self.config.queue_capacity);

        // Enumeration runs beside the workers; pagination is sequential
        // (each page's cursor comes from the previous response) but
        // dispatch starts with the first page.
        let enumeration = {
            let client = self.client.clone();
            let filter = filter.clone();
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                let mut pager = DescriptorPager::new(client, filter);
                loop {
                    let page = tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        page = pager.next_page() => page,
                    };
                    match page {
                        Ok(Some(descriptors)) => {
                            for descriptor in descriptors {
                                if queue_tx.send(descriptor).await.is_err() {
                                    return Ok(());
                                }
                            }
                        }
                        Ok(None) => return Ok(()),
                        Err(err) => return Err(err),
                    }
                }
            })
        };

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut workers: JoinSet<(DownloadTask, WorkerOutcome)> = JoinSet::new();
        let mut report = RunReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            tokio::select! {
                descriptor = queue_rx.recv() => match descriptor {
                    Some(descriptor) => {
                        if !seen.insert(descriptor.filename.clone()) {
                            warn!(
                                filename = %descriptor.filename,
                                "duplicate descriptor in enumeration, ignoring"
                            );
                            continue;
                        }
                        if self.manifest.is_completed(descriptor.id()) {
                            debug!(filename = %descriptor.filename, "already recorded, skipping");
                            report.record_skipped();
                            continue;
                        }
                        let permit = tokio::select! {
                            _ = self.cancel.cancelled() => break,
                            permit = semaphore.clone().acquire_owned() => match permit {
                                Ok(permit) => permit,
                                Err(_) => break,
                            },
                        };
                        self.spawn_worker(&mut workers, descriptor, permit);
                    }
                    None => break,
                },
                Some(result) = workers.join_next(), if !workers.is_empty() => {
                    settle(result, &mut report);
                }
            }
        }

        // Closing the receiver unblocks a still-running pager task.
        drop(queue_rx);
        while let Some(result) = workers.join_next().await {
            settle(result, &mut report);
        }

        if self.cancel.is_cancelled() {
            report.interrupted = true;
        }

        match enumeration.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(RunError::Enumeration {
                    source: err,
                    partial: report,
                })
            }
            Err(join_err) => {
                error!(error = %join_err, "enumeration task aborted");
                report.interrupted = true;
            }
        }

        info!(
            completed = report.completed,
            skipped = report.skipped,
            failed = report.failed_count(),
            bytes = report.bytes_downloaded,
            "run finished"
        );
        Ok(report)
    }

    fn spawn_worker(
        &self,
        workers: &mut JoinSet<(DownloadTask, WorkerOutcome)>,
        descriptor: FileDescriptor,
        permit: tokio::sync::OwnedSemaphorePermit,
    ) {
        let downloader = self.downloader.clone();
        let manifest = Arc::clone(&self.manifest);
        let destination = self.destination.clone();
        let retry = self.config.retry.clone();
        let checksum_retries = self.config.checksum_retries;
        let cancel = self.cancel.clone();
        let progress = self.progress.clone();

        workers.spawn(async move {
            let mut task = DownloadTask::new(descriptor);
            let outcome = execute_with_retry(
                &mut task,
                &downloader,
                &manifest,
                &destination,
                &retry,
                checksum_retries,
                &cancel,
                progress.as_ref(),
            )
            .await;
            drop(permit);
            (task, outcome)
        });
    }
}

/// One task's full attempt loop.
#[allow(clippy::too_many_arguments)]
async fn execute_with_retry(
    task: &mut DownloadTask,
    downloader: &FileDownloader,
    manifest: &ManifestStore,
    destination: &std::path::Path,
    retry: &RetryPolicy,
    checksum_retries: u32,
    cancel: &CancellationToken,
    progress: Option<&TransferProgress>,
) -> WorkerOutcome {
    let mut mismatches = 0u32;
    loop {
        task.start_attempt();
        let result = downloader
            .download(task.descriptor(), destination, cancel, progress)
            .await;

        match result {
            Ok(outcome) => {
                task.begin_verify();
                let (algorithm, checksum) = outcome.checksum();
                let entry = ManifestEntry {
                    filename: task.descriptor().filename.clone(),
                    size: outcome.bytes(),
                    algorithm: algorithm.to_string(),
                    checksum: checksum.to_string(),
                    completed_at: Utc::now(),
                };
                // The ledger write must be durable before the task counts
                // as Completed.
                if let Err(err) = manifest.mark_completed(entry) {
                    task.fail(format!("manifest append failed: {err}"));
                    return WorkerOutcome::Failed;
                }
                let transferred = match &outcome {
                    DownloadOutcome::Completed { bytes, .. } => *bytes,
                    DownloadOutcome::AlreadyComplete { .. } => 0,
                };
                task.complete(outcome.bytes());
                info!(
                    filename = %task.descriptor().filename,
                    bytes = transferred,
                    attempts = task.attempts(),
                    "file completed"
                );
                return WorkerOutcome::Completed { bytes: transferred };
            }
            Err(err) => match err.class() {
                FailureClass::Cancelled => return WorkerOutcome::Cancelled,
                FailureClass::Fatal => {
                    warn!(
                        filename = %task.descriptor().filename,
                        error = %err,
                        "file failed permanently"
                    );
                    task.fail(err.to_string());
                    return WorkerOutcome::Failed;
                }
                FailureClass::Mismatch => {
                    mismatches += 1;
                    if mismatches > checksum_retries {
                        task.fail(err.to_string());
                        return WorkerOutcome::Failed;
                    }
                    warn!(
                        filename = %task.descriptor().filename,
                        error = %err,
                        "checksum mismatch, retrying once"
                    );
                    task.retry(err.to_string());
                }
                FailureClass::Transient => {
                    if task.attempts() >= retry.max_attempts {
                        task.fail(err.to_string());
                        return WorkerOutcome::Failed;
                    }
                    let delay = retry.delay_for(task.attempts());
                    warn!(
                        filename = %task.descriptor().filename,
                        attempt = task.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transfer failed, backing off"
                    );
                    task.retry(err.to_string());
                    tokio::select! {
                        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            },
        }
    }
}

fn settle(result: Result<(DownloadTask, WorkerOutcome), JoinError>, report: &mut RunReport) {
    match result {
        Ok((_, WorkerOutcome::Completed { bytes })) => report.record_completed(bytes),
        Ok((task, WorkerOutcome::Failed)) => {
            report.record_failed(
                task.descriptor().filename.clone(),
                task.last_error().unwrap_or("unknown error").to_string(),
                task.attempts(),
            );
        }
        Ok((_, WorkerOutcome::Cancelled)) => {}
        Err(err) => error!(error = %err, "download worker aborted"),
    }
}
