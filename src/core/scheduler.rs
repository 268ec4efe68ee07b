//! Caller-facing scheduler operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::audit::{AuditAction, AuditTrail};
use super::dispatcher::{Dispatcher, TickReport};
use super::state_machine::transition;
use super::store::TaskStore;
use super::task::{NewTask, Task, TaskDraft, TaskId, TaskStatus};
use super::worker_pool::{PoolStats, WorkerPool};
use super::SchedulerError;
use crate::util::Clock;

/// Attempts at a read-modify-write before giving up with a conflict.
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Entry point used by the request layer.
///
/// Owns the dispatcher and the worker pool; every operation persists its
/// result before returning.
pub struct TaskScheduler {
    store: Arc<dyn TaskStore>,
    pool: Arc<WorkerPool>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
    default_max_retries: u32,
}

impl TaskScheduler {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        pool: Arc<WorkerPool>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
        audit: AuditTrail,
        default_max_retries: u32,
    ) -> Self {
        Self {
            store,
            pool,
            dispatcher,
            clock,
            audit,
            default_max_retries,
        }
    }

    /// Store a new task in `PENDING`.
    ///
    /// Caller-supplied `status` and `retry_count` are ignored.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Validation`] for a blank name, or store errors.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<Task, SchedulerError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(SchedulerError::Validation("task name must not be blank".into()));
        }
        if draft.status.is_some() || draft.retry_count.is_some() {
            debug!("ignoring caller-supplied status/retry count on create");
        }

        let new = NewTask {
            name: name.to_string(),
            description: draft.description,
            priority: draft.priority,
            scheduled_time: draft.scheduled_time.unwrap_or_else(|| self.clock.now()),
            max_retries: draft.max_retries.unwrap_or(self.default_max_retries),
        };
        let task = self.store.insert(new).await?;
        self.audit.record(&task, AuditAction::Created, None, None);
        info!(
            task_id = task.id,
            priority = ?task.priority,
            scheduled_time = %task.scheduled_time,
            "created task"
        );
        Ok(task)
    }

    /// Look up a task.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`] for an unknown id.
    pub async fn get_task(&self, id: TaskId) -> Result<Task, SchedulerError> {
        self.store.get(id).await
    }

    /// Every task.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn get_all_tasks(&self) -> Result<Vec<Task>, SchedulerError> {
        self.store.list().await
    }

    /// Tasks in any of `statuses`.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn tasks_by_status(
        &self,
        statuses: &[TaskStatus],
    ) -> Result<Vec<Task>, SchedulerError> {
        self.store.list_by_status(statuses).await
    }

    /// Tasks created within `[start, end]`.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn tasks_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, SchedulerError> {
        self.store.find_created_between(start, end).await
    }

    /// Caller-requested status change.
    ///
    /// Only the transitions a caller may drive are accepted:
    /// - `QUEUED` claims the task and assigns it a worker slot, exactly like
    ///   [`TaskScheduler::execute_task`];
    /// - `CANCELLED` goes through [`TaskScheduler::cancel_task`] so an
    ///   assigned worker slot is interrupted too.
    ///
    /// `RUNNING`, `RETRYING`, `COMPLETED` and `FAILED` are reached only
    /// through execution, and `PENDING` is never re-entered.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`], [`SchedulerError::InvalidState`],
    /// [`SchedulerError::CapacityExceeded`] for `QUEUED` when every slot is
    /// held, or [`SchedulerError::Conflict`] if the task kept changing.
    pub async fn update_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> Result<Task, SchedulerError> {
        match status {
            TaskStatus::Cancelled => self.cancel_task(id).await?,
            TaskStatus::Queued => self.execute_task(id).await?,
            to => {
                let current = self.store.get(id).await?;
                debug!(task_id = id, from = %current.status, %to, "caller transition refused");
                return Err(SchedulerError::InvalidState {
                    id,
                    from: current.status,
                    to,
                });
            }
        }
        self.store.get(id).await
    }

    /// Cancel a non-terminal task.
    ///
    /// `CANCELLED` is persisted first, then the worker slot (if any) is
    /// interrupted. A late resolution from the interrupted work is discarded
    /// by the executor.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`], or [`SchedulerError::InvalidState`] if
    /// the task is already terminal.
    pub async fn cancel_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        let (saved, from) = self.transition_task(id, TaskStatus::Cancelled).await?;
        let interrupted = self.pool.cancel(id);
        self.audit.record(
            &saved,
            AuditAction::Cancelled,
            Some(from),
            interrupted.then(|| "worker interrupted".to_string()),
        );
        info!(task_id = id, %from, interrupted, "task cancelled");
        Ok(())
    }

    /// Trigger execution of a `PENDING` or `RETRYING` task now, regardless
    /// of its scheduled time. Returns once the task holds a worker slot;
    /// the work itself runs in the background.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotFound`], [`SchedulerError::InvalidState`],
    /// [`SchedulerError::CapacityExceeded`] when every slot is held, or
    /// [`SchedulerError::Conflict`] if the dispatcher claimed it first.
    pub async fn execute_task(&self, id: TaskId) -> Result<(), SchedulerError> {
        let task = self.store.get(id).await?;
        self.pool.reconcile();
        if !self.pool.has_capacity() && !task.status.is_terminal() {
            return Err(SchedulerError::CapacityExceeded);
        }
        self.dispatcher.claim_and_submit(task).await?;
        info!(task_id = id, "task execution started");
        Ok(())
    }

    /// Run one dispatcher tick immediately.
    ///
    /// # Errors
    ///
    /// Store errors abandon the tick.
    pub async fn tick(&self) -> Result<TickReport, SchedulerError> {
        self.dispatcher.tick().await
    }

    /// Dispatcher driving this scheduler.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Worker pool statistics.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Whether `id` currently holds a live worker slot.
    #[must_use]
    pub fn is_in_flight(&self, id: TaskId) -> bool {
        self.pool.is_in_flight(id)
    }

    /// Stop accepting work and drain the pool. See [`WorkerPool::shutdown`].
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.pool.shutdown(grace).await
    }

    /// Read, transition, conditionally save; retried while the stored
    /// status keeps moving. Returns the saved task and the status it left.
    async fn transition_task(
        &self,
        id: TaskId,
        to: TaskStatus,
    ) -> Result<(Task, TaskStatus), SchedulerError> {
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let current = self.store.get(id).await?;
            let from = current.status;
            let mut next = current;
            transition(&mut next, to, self.clock.now())?;
            if let Some(saved) = self.store.save_if_status(next, from).await? {
                return Ok((saved, from));
            }
            debug!(task_id = id, %from, %to, "task changed concurrently; retrying update");
        }
        Err(SchedulerError::Conflict(id))
    }
}
