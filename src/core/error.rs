//! Error types for scheduler operations.

use thiserror::Error;

use super::task::{TaskId, TaskStatus};

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No task exists with the given id.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// The requested status transition is not permitted.
    #[error("invalid state transition for task {id}: {from} -> {to}")]
    InvalidState {
        /// Task identifier.
        id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
    /// Caller input was rejected.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Every worker slot is occupied.
    #[error("capacity exceeded")]
    CapacityExceeded,
    /// The task changed concurrently while being updated.
    #[error("concurrent modification of task {0}")]
    Conflict(TaskId),
    /// The worker pool no longer accepts work.
    #[error("worker pool has been shut down")]
    PoolShutdown,
    /// Store-specific failure with context.
    #[error("store error: {0}")]
    Store(String),
}

/// Failure raised by a task's own work.
///
/// Never surfaces to callers: the executor converts it into a retry or a
/// terminal failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkError {
    /// Work returned an error.
    #[error("{0}")]
    Failed(String),
    /// Work panicked.
    #[error("work panicked: {0}")]
    Panicked(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
