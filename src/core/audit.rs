//! Task lifecycle audit trail.
//!
//! Every persisted transition can be mirrored to an [`AuditSink`]. Sinks are
//! optional; recording never fails the operation that produced the event.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{TaskId, TaskStatus};

/// Kind of lifecycle step recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task was created.
    Created,
    /// Dispatcher claimed the task.
    Queued,
    /// A claimed task was handed back because no slot could take it.
    Released,
    /// Executor started work.
    Started,
    /// Work succeeded.
    Completed,
    /// Work failed and another attempt is scheduled.
    RetryScheduled,
    /// Work failed and retries are exhausted.
    Failed,
    /// Task was cancelled.
    Cancelled,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Released => "released",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::RetryScheduled => "retry_scheduled",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related task.
    pub task_id: TaskId,
    /// Action taken.
    pub action: AuditAction,
    /// Status before the step, if any.
    pub from: Option<TaskStatus>,
    /// Status after the step.
    pub to: TaskStatus,
    /// Retry counter after the step.
    pub retry_count: u32,
    /// When the step happened.
    pub at: DateTime<Utc>,
    /// Additional context (error message, result...).
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// Bounded in-memory audit sink for testing and dev.
///
/// Clones share the same buffer.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events for one task, oldest first.
    #[must_use]
    pub fn events_for(&self, task_id: TaskId) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if self.max_events == 0 {
            return;
        }
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event with a fresh id.
#[must_use]
pub fn build_audit_event(
    task_id: TaskId,
    action: AuditAction,
    from: Option<TaskStatus>,
    to: TaskStatus,
    retry_count: u32,
    at: DateTime<Utc>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        task_id,
        action,
        from,
        to,
        retry_count,
        at,
        detail,
    }
}

/// Shared optional sink handle used by the scheduler components.
#[derive(Clone, Default)]
pub(crate) struct AuditTrail(Option<Arc<dyn AuditSink>>);

impl AuditTrail {
    pub(crate) fn new(sink: Option<Arc<dyn AuditSink>>) -> Self {
        Self(sink)
    }

    pub(crate) fn record(
        &self,
        task: &super::task::Task,
        action: AuditAction,
        from: Option<TaskStatus>,
        detail: Option<String>,
    ) {
        if let Some(sink) = &self.0 {
            sink.record(build_audit_event(
                task.id,
                action,
                from,
                task.status,
                task.retry_count,
                task.updated_at,
                detail,
            ));
        }
    }
}
