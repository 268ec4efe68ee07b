//! Periodic dispatcher: selects ready and retry-eligible tasks and hands
//! them to the worker pool.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::audit::{AuditAction, AuditTrail};
use super::executor::Executor;
use super::state_machine::transition;
use super::store::TaskStore;
use super::task::{Task, TaskId, TaskStatus};
use super::worker_pool::WorkerPool;
use super::SchedulerError;
use crate::util::Clock;

/// Summary of one dispatcher tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Ready (`PENDING`, due) candidates found.
    pub ready: usize,
    /// Retry-eligible candidates found.
    pub retryable: usize,
    /// Tasks submitted, in submission order.
    pub dispatched: Vec<TaskId>,
    /// Candidates left for a later tick because every slot was held.
    pub deferred: usize,
    /// Candidates skipped because they changed concurrently.
    pub skipped: usize,
    /// Finished slots released.
    pub reconciled: usize,
}

/// Selects work on a fixed period and enforces the concurrency cap.
pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    pool: Arc<WorkerPool>,
    executor: Arc<Executor>,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
    tick_interval: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        pool: Arc<WorkerPool>,
        executor: Arc<Executor>,
        clock: Arc<dyn Clock>,
        audit: AuditTrail,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            pool,
            executor,
            clock,
            audit,
            tick_interval,
        }
    }

    /// Configured period between ticks.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Run one selection and submission pass.
    ///
    /// Ready tasks are considered first (priority desc, scheduled time asc),
    /// then retry-eligible ones. Capacity is rechecked before every
    /// submission; candidates that do not fit wait for a later tick.
    ///
    /// # Errors
    ///
    /// Store failures abandon the tick; the next tick starts over.
    pub async fn tick(&self) -> Result<TickReport, SchedulerError> {
        let mut report = TickReport {
            reconciled: self.pool.reconcile(),
            ..TickReport::default()
        };

        let now = self.clock.now();
        let ready = self.store.find_ready_to_execute(now).await?;
        let retryable = self.store.find_eligible_for_retry().await?;
        report.ready = ready.len();
        report.retryable = retryable.len();

        for task in ready.into_iter().chain(retryable) {
            if !self.pool.has_capacity() {
                report.deferred += 1;
                continue;
            }
            let task_id = task.id;
            match self.claim_and_submit(task).await {
                Ok(()) => report.dispatched.push(task_id),
                Err(SchedulerError::CapacityExceeded) => report.deferred += 1,
                Err(e @ SchedulerError::Store(_)) => return Err(e),
                Err(e) => {
                    debug!(task_id, error = %e, "candidate skipped");
                    report.skipped += 1;
                }
            }
        }

        report.reconciled += self.pool.reconcile();
        if !report.dispatched.is_empty() || report.deferred > 0 {
            info!(
                ready = report.ready,
                retryable = report.retryable,
                dispatched = report.dispatched.len(),
                deferred = report.deferred,
                in_flight = self.pool.in_flight(),
                "dispatcher tick"
            );
        }
        Ok(report)
    }

    /// Claim `task` (`PENDING`/`RETRYING` -> `QUEUED`), persist the claim and
    /// submit it to the pool under its id.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidState`] if the task cannot be queued;
    /// - [`SchedulerError::Conflict`] if it changed since it was read;
    /// - pool errors, after the claim has been rolled back.
    pub async fn claim_and_submit(&self, task: Task) -> Result<(), SchedulerError> {
        let task_id = task.id;
        let previous = task.status;

        let mut claimed = task;
        transition(&mut claimed, TaskStatus::Queued, self.clock.now())?;
        let Some(claimed) = self.store.save_if_status(claimed, previous).await? else {
            return Err(SchedulerError::Conflict(task_id));
        };
        self.audit
            .record(&claimed, AuditAction::Queued, Some(previous), None);

        let executor = Arc::clone(&self.executor);
        if let Err(e) = self
            .pool
            .submit(task_id, async move { executor.run(task_id).await })
        {
            self.release(claimed, previous).await;
            return Err(e);
        }

        debug!(
            task_id,
            priority = ?claimed.priority,
            retry_count = claimed.retry_count,
            "task dispatched"
        );
        Ok(())
    }

    /// Undo a claim that no slot accepted. This is a rollback, not a
    /// lifecycle transition.
    async fn release(&self, claimed: Task, previous: TaskStatus) {
        let task_id = claimed.id;
        let mut restored = claimed;
        restored.status = previous;
        match self.store.save_if_status(restored, TaskStatus::Queued).await {
            Ok(Some(saved)) => {
                self.audit
                    .record(&saved, AuditAction::Released, Some(TaskStatus::Queued), None);
            }
            Ok(None) => debug!(task_id, "claim changed before release"),
            Err(e) => error!(task_id, error = %e, "cannot release claim"),
        }
    }

    /// Tick every period until `shutdown` turns true or its sender drops.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.tick_interval.as_millis(),
            capacity = self.pool.capacity(),
            "dispatcher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "dispatcher tick abandoned");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("dispatcher stopped");
    }
}
