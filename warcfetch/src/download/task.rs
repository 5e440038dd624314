//! Per-file transfer state.

use crate::api::FileDescriptor;

/// Lifecycle of a download task.
///
/// Transitions are strictly forward; a retry returns the task to
/// `Pending` for its next attempt, and `Failed` is terminal once the
/// retry budget is exhausted:
///
/// ```text
/// Pending ──► InProgress ──► Verifying ──► Completed
///    ▲            │              │
///    └── retry ───┴──────────────┘──► Failed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting for a worker (or for its next attempt).
    Pending,
    /// Bytes are being transferred.
    InProgress,
    /// Transfer finished; digest comparison and manifest write pending.
    Verifying,
    /// Verified and recorded; the final file exists.
    Completed,
    /// Retry budget exhausted; recorded in the run report.
    Failed,
}

/// Mutable per-file transfer state.
///
/// Created when the coordinator dispatches a descriptor and destroyed when
/// the task settles. The descriptor itself stays immutable.
#[derive(Debug)]
pub struct DownloadTask {
    descriptor: FileDescriptor,
    status: TaskStatus,
    attempts: u32,
    bytes_transferred: u64,
    last_error: Option<String>,
}

impl DownloadTask {
    /// Create a pending task for a descriptor.
    pub fn new(descriptor: FileDescriptor) -> Self {
        Self {
            descriptor,
            status: TaskStatus::Pending,
            attempts: 0,
            bytes_transferred: 0,
            last_error: None,
        }
    }

    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Attempts started so far (including the current one).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Begin an attempt: `Pending → InProgress`.
    ///
    /// # Panics
    ///
    /// Panics on a non-forward transition; the coordinator owns the state
    /// machine and never drives one backwards.
    pub fn start_attempt(&mut self) {
        assert_eq!(
            self.status,
            TaskStatus::Pending,
            "attempt started from {:?}",
            self.status
        );
        self.status = TaskStatus::InProgress;
        self.attempts += 1;
    }

    /// Record transfer progress.
    pub fn set_bytes_transferred(&mut self, bytes: u64) {
        self.bytes_transferred = bytes;
    }

    /// Transfer done, verification underway: `InProgress → Verifying`.
    pub fn begin_verify(&mut self) {
        assert_eq!(self.status, TaskStatus::InProgress);
        self.status = TaskStatus::Verifying;
    }

    /// Verified and recorded: `Verifying → Completed`.
    pub fn complete(&mut self, bytes: u64) {
        assert_eq!(self.status, TaskStatus::Verifying);
        self.status = TaskStatus::Completed;
        self.bytes_transferred = bytes;
        self.last_error = None;
    }

    /// Attempt failed but the budget allows another: back to `Pending`.
    pub fn retry(&mut self, error: impl Into<String>) {
        assert!(matches!(
            self.status,
            TaskStatus::InProgress | TaskStatus::Verifying
        ));
        self.status = TaskStatus::Pending;
        self.last_error = Some(error.into());
    }

    /// Terminal failure.
    pub fn fail(&mut self, error: impl Into<String>) {
        assert_ne!(self.status, TaskStatus::Completed);
        self.status = TaskStatus::Failed;
        self.last_error = Some(error.into());
    }
}
