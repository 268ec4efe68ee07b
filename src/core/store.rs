//! Task store abstraction.
//!
//! The store is the sole durable owner of tasks. The scheduler only holds
//! transient copies and persists every mutation immediately.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::task::{NewTask, Task, TaskId, TaskStatus};
use super::SchedulerError;

/// Abstraction for task persistence backends.
///
/// Implementations must serialize conflicting writes per task so that
/// [`TaskStore::save_if_status`] behaves as an atomic compare-and-set.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// First save: assign an id, `created_at` and `updated_at`; the task
    /// starts `PENDING` with a zero retry count.
    async fn insert(&self, new: NewTask) -> Result<Task, SchedulerError>;

    /// Look up a task, failing with [`SchedulerError::NotFound`].
    async fn get(&self, id: TaskId) -> Result<Task, SchedulerError>;

    /// Upsert. The stored `created_at` is preserved and `updated_at` is
    /// advanced.
    async fn save(&self, task: Task) -> Result<Task, SchedulerError>;

    /// Save only if the stored status still equals `expected`.
    ///
    /// Returns `Ok(None)` when the stored status differs.
    async fn save_if_status(
        &self,
        task: Task,
        expected: TaskStatus,
    ) -> Result<Option<Task>, SchedulerError>;

    /// All tasks ordered by id.
    async fn list(&self) -> Result<Vec<Task>, SchedulerError>;

    /// Tasks whose status is any of `statuses`, ordered by id.
    async fn list_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, SchedulerError>;

    /// `PENDING` tasks with `scheduled_time <= now`, highest priority first,
    /// then earliest scheduled time.
    async fn find_ready_to_execute(&self, now: DateTime<Utc>) -> Result<Vec<Task>, SchedulerError>;

    /// `RETRYING` tasks with `retry_count < max_retries`, in the same order
    /// as [`TaskStore::find_ready_to_execute`].
    async fn find_eligible_for_retry(&self) -> Result<Vec<Task>, SchedulerError>;

    /// Tasks created within `[start, end]`, ordered by creation time.
    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, SchedulerError>;
}

#[async_trait]
impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    async fn insert(&self, new: NewTask) -> Result<Task, SchedulerError> {
        (**self).insert(new).await
    }

    async fn get(&self, id: TaskId) -> Result<Task, SchedulerError> {
        (**self).get(id).await
    }

    async fn save(&self, task: Task) -> Result<Task, SchedulerError> {
        (**self).save(task).await
    }

    async fn save_if_status(
        &self,
        task: Task,
        expected: TaskStatus,
    ) -> Result<Option<Task>, SchedulerError> {
        (**self).save_if_status(task, expected).await
    }

    async fn list(&self) -> Result<Vec<Task>, SchedulerError> {
        (**self).list().await
    }

    async fn list_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, SchedulerError> {
        (**self).list_by_status(statuses).await
    }

    async fn find_ready_to_execute(&self, now: DateTime<Utc>) -> Result<Vec<Task>, SchedulerError> {
        (**self).find_ready_to_execute(now).await
    }

    async fn find_eligible_for_retry(&self) -> Result<Vec<Task>, SchedulerError> {
        (**self).find_eligible_for_retry().await
    }

    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, SchedulerError> {
        (**self).find_created_between(start, end).await
    }
}

/// Selection order shared by the ready and retry queries.
pub fn selection_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.scheduled_time.cmp(&b.scheduled_time))
        .then_with(|| a.id.cmp(&b.id))
}
