//! Tests for error types

use prometheus_task_scheduler::core::{SchedulerError, TaskStatus, WorkError};

#[test]
fn test_not_found_error() {
    let err = SchedulerError::NotFound(42);
    assert_eq!(format!("{}", err), "task not found: 42");
}

#[test]
fn test_invalid_state_error() {
    let err = SchedulerError::InvalidState {
        id: 7,
        from: TaskStatus::Completed,
        to: TaskStatus::Pending,
    };
    assert_eq!(
        format!("{}", err),
        "invalid state transition for task 7: COMPLETED -> PENDING"
    );
}

#[test]
fn test_capacity_exceeded_error() {
    let err = SchedulerError::CapacityExceeded;
    assert_eq!(format!("{}", err), "capacity exceeded");
}

#[test]
fn test_store_error() {
    let err = SchedulerError::Store("connection reset".to_string());
    assert_eq!(format!("{}", err), "store error: connection reset");
}

#[test]
fn test_work_error_display_is_the_message() {
    assert_eq!(WorkError::Failed("disk full".into()).to_string(), "disk full");
    assert_eq!(
        WorkError::Panicked("boom".into()).to_string(),
        "work panicked: boom"
    );
}

#[test]
fn test_scheduler_error_converts_to_anyhow() {
    let err: anyhow::Error = SchedulerError::Conflict(3).into();
    assert!(err.to_string().contains('3'));
}
