//! Task execution: the work capability and the executor that drives one
//! task from `QUEUED` to a resolution.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use rand::Rng;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::audit::{AuditAction, AuditTrail};
use super::retry::{RetryDecision, RetryPolicy};
use super::state_machine::transition;
use super::store::TaskStore;
use super::task::{Task, TaskId, TaskStatus};
use super::WorkError;
use crate::config::WorkConfig;
use crate::util::Clock;

/// Result text recorded by [`SimulatedWork`] on success.
pub const SIMULATED_RESULT: &str = "Task completed successfully";

/// The actual work performed for a task.
///
/// Implementations may block or sleep; they run inside their own worker
/// slot. Errors and panics are absorbed by the [`Executor`].
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_scheduler::core::{Task, TaskWork, WorkError};
///
/// struct Echo;
///
/// #[async_trait]
/// impl TaskWork for Echo {
///     async fn perform(&self, task: &Task) -> Result<String, WorkError> {
///         Ok(format!("ran {}", task.name))
///     }
/// }
/// ```
#[async_trait]
pub trait TaskWork: Send + Sync + 'static {
    /// Perform the work for `task` and return its result text.
    async fn perform(&self, task: &Task) -> Result<String, WorkError>;
}

/// Placeholder work used when no real payload exists: sleeps for a random
/// duration within the configured bounds and fails with the configured
/// probability.
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    min_duration: Duration,
    max_duration: Duration,
    failure_rate: f64,
}

impl SimulatedWork {
    /// Create from explicit bounds. `failure_rate` is clamped to `[0, 1]`;
    /// NaN counts as zero.
    #[must_use]
    pub fn new(min_duration: Duration, max_duration: Duration, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            min_duration: min_duration.min(max_duration),
            max_duration,
            failure_rate,
        }
    }
}

impl From<&WorkConfig> for SimulatedWork {
    fn from(cfg: &WorkConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.min_duration_ms),
            Duration::from_millis(cfg.max_duration_ms),
            cfg.failure_rate,
        )
    }
}

#[async_trait]
impl TaskWork for SimulatedWork {
    async fn perform(&self, task: &Task) -> Result<String, WorkError> {
        // ThreadRng is not Send; draw everything before the await.
        let (delay, fail) = {
            let mut rng = rand::rng();
            let delay = rng.random_range(self.min_duration..=self.max_duration);
            (delay, rng.random_bool(self.failure_rate))
        };
        debug!(task_id = task.id, delay_ms = delay.as_millis(), "simulating work");
        tokio::time::sleep(delay).await;

        if fail {
            return Err(WorkError::Failed("Simulated task failure".into()));
        }
        Ok(SIMULATED_RESULT.to_string())
    }
}

/// Runs a single task to its resolution.
///
/// Every status change is persisted before the next step. Resolutions are
/// written with a conditional save against `RUNNING`, so a task cancelled
/// meanwhile stays `CANCELLED`.
pub struct Executor {
    store: Arc<dyn TaskStore>,
    work: Arc<dyn TaskWork>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    audit: AuditTrail,
}

impl Executor {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        work: Arc<dyn TaskWork>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
        audit: AuditTrail,
    ) -> Self {
        Self {
            store,
            work,
            retry,
            clock,
            audit,
        }
    }

    /// Execute the queued task `task_id`.
    ///
    /// Never fails: store errors are logged and work errors are handed to the
    /// retry policy. If `RUNNING` cannot be persisted the claim is returned to
    /// `PENDING`/`RETRYING`. A task that cannot be loaded stays `QUEUED`, and
    /// one whose resolution the store refuses stays `RUNNING`, until a caller
    /// cancels it.
    pub async fn run(&self, task_id: TaskId) {
        self.run_inner(task_id)
            .instrument(info_span!("execute", task_id))
            .await;
    }

    async fn run_inner(&self, task_id: TaskId) {
        let Some(running) = self.start(task_id).await else {
            return;
        };

        let outcome = AssertUnwindSafe(self.work.perform(&running))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(WorkError::Panicked(panic_message(&*panic))));

        let now = self.clock.now();
        match outcome {
            Ok(result) => {
                let mut done = running;
                if let Err(e) = transition(&mut done, TaskStatus::Completed, now) {
                    error!(error = %e, "cannot complete task");
                    return;
                }
                done.result = Some(result);
                if let Some(saved) = self.resolve(done).await {
                    info!(task_id, "task completed successfully");
                    self.audit.record(
                        &saved,
                        AuditAction::Completed,
                        Some(TaskStatus::Running),
                        saved.result.clone(),
                    );
                }
            }
            Err(work_error) => {
                warn!(task_id, error = %work_error, "task failed");
                let (next, decision) = match self.retry.on_failure(running, &work_error, now) {
                    Ok(evaluated) => evaluated,
                    Err(e) => {
                        error!(error = %e, "cannot evaluate failure");
                        return;
                    }
                };
                let Some(saved) = self.resolve(next).await else {
                    return;
                };
                let action = match decision {
                    RetryDecision::Retry { attempt } => {
                        info!(
                            task_id,
                            attempt,
                            max_retries = saved.max_retries,
                            "task will be retried"
                        );
                        AuditAction::RetryScheduled
                    }
                    RetryDecision::Exhausted { attempts } => {
                        error!(task_id, attempts, "task failed after exhausting retries");
                        AuditAction::Failed
                    }
                };
                self.audit.record(
                    &saved,
                    action,
                    Some(TaskStatus::Running),
                    saved.error_message.clone(),
                );
            }
        }
    }

    /// `QUEUED -> RUNNING`, persisted. `None` if the task is gone or no
    /// longer queued.
    async fn start(&self, task_id: TaskId) -> Option<Task> {
        let task = match self.store.get(task_id).await {
            Ok(task) => task,
            Err(e) => {
                error!(error = %e, "cannot load task");
                return None;
            }
        };

        let mut running = task.clone();
        if let Err(e) = transition(&mut running, TaskStatus::Running, self.clock.now()) {
            info!(error = %e, "task is not runnable; skipping");
            return None;
        }

        match self.store.save_if_status(running, TaskStatus::Queued).await {
            Ok(Some(saved)) => {
                debug!(retry_count = saved.retry_count, "task running");
                self.audit
                    .record(&saved, AuditAction::Started, Some(TaskStatus::Queued), None);
                Some(saved)
            }
            Ok(None) => {
                info!("task left QUEUED before it started; skipping");
                None
            }
            Err(e) => {
                error!(error = %e, "cannot persist RUNNING");
                self.requeue(task).await;
                None
            }
        }
    }

    /// Hand a claim that never started back to the dispatcher.
    async fn requeue(&self, queued: Task) {
        let task_id = queued.id;
        let previous = if queued.retry_count > 0 {
            TaskStatus::Retrying
        } else {
            TaskStatus::Pending
        };
        let mut restored = queued;
        restored.status = previous;
        match self.store.save_if_status(restored, TaskStatus::Queued).await {
            Ok(Some(saved)) => {
                self.audit
                    .record(&saved, AuditAction::Released, Some(TaskStatus::Queued), None);
                info!(task_id, %previous, "claim returned for a later tick");
            }
            Ok(None) => debug!(task_id, "claim changed before requeue"),
            Err(e) => error!(task_id, error = %e, "cannot requeue task; it stays QUEUED"),
        }
    }

    /// Persist a resolution unless the task was cancelled meanwhile.
    async fn resolve(&self, resolved: Task) -> Option<Task> {
        let task_id = resolved.id;
        match self.store.get(task_id).await {
            Ok(current) if current.status == TaskStatus::Cancelled => {
                info!(task_id, "task was cancelled during execution; discarding resolution");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                error!(task_id, error = %e, "cannot re-read task before resolving");
                return None;
            }
        }

        let status = resolved.status;
        match self.store.save_if_status(resolved, TaskStatus::Running).await {
            Ok(Some(saved)) => Some(saved),
            Ok(None) => {
                info!(task_id, %status, "task changed during execution; discarding resolution");
                None
            }
            Err(e) => {
                error!(task_id, error = %e, "cannot persist resolution");
                None
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
