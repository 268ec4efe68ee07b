//! Retry policy applied after a failed attempt.

use chrono::{DateTime, Utc};

use super::state_machine::transition;
use super::task::{Task, TaskStatus};
use super::{SchedulerError, WorkError};

/// Prefix recorded on the error message once retries are exhausted.
pub const RETRIES_EXHAUSTED_PREFIX: &str = "Max retries exceeded: ";

/// Outcome of evaluating a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Task moved to `RETRYING`; it will be selected again.
    Retry {
        /// Failed attempts so far.
        attempt: u32,
    },
    /// Task moved to `FAILED`.
    Exhausted {
        /// Failed attempts in total.
        attempts: u32,
    },
}

/// Decides whether a failed task is retried or failed for good.
///
/// Pure: it only computes the next task state, persisting it is up to the
/// caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    /// Evaluate a failure of `task`, which must be `RUNNING`.
    ///
    /// The retry counter is incremented (never past `max_retries`). While it
    /// stays below `max_retries` the task becomes `RETRYING`, otherwise it
    /// becomes `FAILED` with the message prefixed by
    /// [`RETRIES_EXHAUSTED_PREFIX`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidState`] if `task` is not running.
    pub fn on_failure(
        self,
        mut task: Task,
        error: &WorkError,
        now: DateTime<Utc>,
    ) -> Result<(Task, RetryDecision), SchedulerError> {
        let attempts = task.retry_count.saturating_add(1).min(task.max_retries);

        if attempts < task.max_retries {
            transition(&mut task, TaskStatus::Retrying, now)?;
            task.retry_count = attempts;
            task.error_message = Some(error.to_string());
            Ok((task, RetryDecision::Retry { attempt: attempts }))
        } else {
            transition(&mut task, TaskStatus::Failed, now)?;
            task.retry_count = attempts;
            task.error_message = Some(format!("{RETRIES_EXHAUSTED_PREFIX}{error}"));
            Ok((task, RetryDecision::Exhausted { attempts }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{NewTask, TaskPriority};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn running(max_retries: u32) -> Task {
        let mut task = Task::from_new(
            3,
            NewTask {
                name: "flaky".into(),
                description: None,
                priority: TaskPriority::Low,
                scheduled_time: now(),
                max_retries,
            },
            now(),
        );
        task.status = TaskStatus::Running;
        task.started_at = Some(now());
        task
    }

    fn boom() -> WorkError {
        WorkError::Failed("boom".into())
    }

    #[test]
    fn three_failures_exhaust_three_retries() {
        let policy = RetryPolicy;
        let mut task = running(3);
        let mut decisions = Vec::new();

        for _ in 0..3 {
            let (next, decision) = policy.on_failure(task, &boom(), now()).unwrap();
            decisions.push(decision);
            task = next;
            assert!(task.retry_count <= task.max_retries);
            if task.status == TaskStatus::Retrying {
                task.status = TaskStatus::Running;
            }
        }

        assert_eq!(
            decisions,
            vec![
                RetryDecision::Retry { attempt: 1 },
                RetryDecision::Retry { attempt: 2 },
                RetryDecision::Exhausted { attempts: 3 },
            ]
        );
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.completed_at, Some(now()));
        assert_eq!(task.error_message.as_deref(), Some("Max retries exceeded: boom"));
    }

    #[test]
    fn retrying_keeps_completed_at_unset() {
        let (task, _) = RetryPolicy.on_failure(running(2), &boom(), now()).unwrap();
        assert_eq!(task.status, TaskStatus::Retrying);
        assert_eq!(task.error_message.as_deref(), Some("boom"));
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn zero_retries_fails_immediately_without_overflowing_counter() {
        let (task, decision) = RetryPolicy.on_failure(running(0), &boom(), now()).unwrap();
        assert_eq!(decision, RetryDecision::Exhausted { attempts: 0 });
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 0);
    }

    #[test]
    fn rejects_tasks_that_are_not_running() {
        let mut task = running(3);
        task.status = TaskStatus::Cancelled;
        assert!(RetryPolicy.on_failure(task, &boom(), now()).is_err());
    }
}
