//! Task model: the unit of work tracked by the scheduler.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task identifier assigned by the store on first save.
pub type TaskId = u64;

/// Default retry limit applied when a submission does not name one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Stored and waiting for its scheduled time.
    Pending,
    /// Claimed by the dispatcher and occupying a worker slot.
    Queued,
    /// Work is in progress.
    Running,
    /// Last attempt failed; eligible for another attempt.
    Retrying,
    /// Work finished successfully.
    Completed,
    /// Work failed and retries are exhausted.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl TaskStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Queued,
        Self::Running,
        Self::Retrying,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Whether no further transitions are permitted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Upper-case name used on the wire and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Retrying => "RETRYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. Declaration order defines the ordering (`Low < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Preferred over medium and low.
    High,
    /// Always selected first.
    Critical,
}

/// A stored task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier.
    pub id: TaskId,
    /// Human readable name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Selection priority.
    pub priority: TaskPriority,
    /// Instant after which the task is eligible to run.
    pub scheduled_time: DateTime<Utc>,
    /// First time the task entered `RUNNING`.
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the task reaches a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Output of successful work.
    pub result: Option<String>,
    /// Last failure message.
    pub error_message: Option<String>,
    /// Number of failed attempts so far.
    pub retry_count: u32,
    /// Maximum number of failed attempts before the task is failed for good.
    pub max_retries: u32,
    /// Creation instant, never changes.
    pub created_at: DateTime<Utc>,
    /// Last mutation instant, strictly increasing.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a freshly stored task from normalized input.
    #[must_use]
    pub fn from_new(id: TaskId, new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            status: TaskStatus::Pending,
            priority: new.priority,
            scheduled_time: new.scheduled_time,
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            retry_count: 0,
            max_retries: new.max_retries,
            created_at: now,
            updated_at: now,
        }
    }

    /// Ready task: pending and due.
    #[must_use]
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.scheduled_time <= now
    }

    /// Retry-eligible task: retrying and under its retry limit.
    #[must_use]
    pub fn is_retry_eligible(&self) -> bool {
        self.status == TaskStatus::Retrying && self.retry_count < self.max_retries
    }
}

/// Caller-supplied task submission.
///
/// Mirrors what a request body may carry. `status` and `retry_count` are
/// accepted for compatibility but always ignored on creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Task name, must not be blank.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Priority; defaults to `MEDIUM`.
    #[serde(default)]
    pub priority: TaskPriority,
    /// When the task becomes eligible; defaults to "now".
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Retry limit; defaults to the scheduler's configured value.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Ignored on creation.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Ignored on creation.
    #[serde(default)]
    pub retry_count: Option<u32>,
}

impl TaskDraft {
    /// Draft with the given name and defaults for everything else.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the scheduled time.
    #[must_use]
    pub const fn with_scheduled_time(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(at);
        self
    }

    /// Set the retry limit.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Normalized input handed to [`crate::core::TaskStore::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Task name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Priority.
    pub priority: TaskPriority,
    /// Eligibility instant.
    pub scheduled_time: DateTime<Utc>,
    /// Retry limit.
    pub max_retries: u32,
}
