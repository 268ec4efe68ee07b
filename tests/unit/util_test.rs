//! Tests for utility functions

use chrono::{Duration, TimeZone, Utc};
use prometheus_task_scheduler::core::{TaskPriority, TaskStatus};
use prometheus_task_scheduler::util::{init_tracing, Clock, ManualClock, SystemClock};

#[test]
fn test_priority_ordering() {
    assert!(TaskPriority::Critical > TaskPriority::High);
    assert!(TaskPriority::High > TaskPriority::Medium);
    assert!(TaskPriority::Medium > TaskPriority::Low);
    assert_eq!(TaskPriority::default(), TaskPriority::Medium);
}

#[test]
fn test_status_wire_names() {
    assert_eq!(serde_json::to_string(&TaskStatus::Retrying).unwrap(), "\"RETRYING\"");
    let parsed: TaskStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
    assert_eq!(parsed, TaskStatus::Cancelled);
}

#[test]
fn test_manual_clock() {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    clock.advance(Duration::minutes(3));
    assert_eq!(clock.now(), start + Duration::minutes(3));
}

#[test]
fn test_system_clock_moves_forward() {
    let a = SystemClock.now();
    let b = SystemClock.now();
    assert!(b >= a);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing("warn");
    init_tracing("debug");
    tracing::info!("still fine");
}
