//! Task status transitions.
//!
//! Every mutation of a task's status goes through [`transition`], which
//! checks the transition table and applies the timestamp side effects.

use chrono::{DateTime, Utc};

use super::task::{Task, TaskStatus};
use super::SchedulerError;

/// Whether `from -> to` is a permitted transition.
#[must_use]
pub const fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::{Cancelled, Completed, Failed, Pending, Queued, Retrying, Running};

    match (from, to) {
        (Pending | Retrying, Queued)
        | (Queued, Running)
        | (Running, Completed | Retrying | Failed) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

/// Move `task` to `to`, applying side effects.
///
/// - entering `RUNNING` sets `started_at` the first time only;
/// - entering a terminal status sets `completed_at`.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidState`] when the transition is not
/// permitted; `task` is left untouched.
pub fn transition(
    task: &mut Task,
    to: TaskStatus,
    now: DateTime<Utc>,
) -> Result<(), SchedulerError> {
    if !can_transition(task.status, to) {
        return Err(SchedulerError::InvalidState {
            id: task.id,
            from: task.status,
            to,
        });
    }

    task.status = to;
    if to == TaskStatus::Running && task.started_at.is_none() {
        task.started_at = Some(now);
    }
    if to.is_terminal() {
        task.completed_at = Some(now);
    }
    Ok(())
}
