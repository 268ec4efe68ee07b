//! Tests for audit sink

use chrono::Utc;
use prometheus_task_scheduler::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, TaskStatus,
};

fn event(task_id: u64, action: AuditAction) -> prometheus_task_scheduler::core::AuditEvent {
    build_audit_event(task_id, action, None, TaskStatus::Pending, 0, Utc::now(), None)
}

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);

    let recorded = build_audit_event(
        1,
        AuditAction::Queued,
        Some(TaskStatus::Pending),
        TaskStatus::Queued,
        0,
        Utc::now(),
        Some("claimed".to_string()),
    );
    sink.record(recorded.clone());

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0], recorded);
    assert_eq!(events[0].from, Some(TaskStatus::Pending));
    assert_eq!(events[0].detail.as_deref(), Some("claimed"));
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    let first = event(1, AuditAction::Created);
    sink.record(first.clone());
    sink.record(event(2, AuditAction::Created));
    sink.record(event(3, AuditAction::Created));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event_id != first.event_id));
    assert_eq!(events[0].task_id, 2);
    assert_eq!(events[1].task_id, 3);
}

#[test]
fn test_audit_events_filter_by_task() {
    let sink = InMemoryAuditSink::new(10);
    let shared = sink.clone();
    shared.record(event(1, AuditAction::Created));
    shared.record(event(2, AuditAction::Created));
    shared.record(event(1, AuditAction::Cancelled));

    let actions: Vec<AuditAction> = sink.events_for(1).into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Created, AuditAction::Cancelled]);
}

#[test]
fn test_event_ids_are_unique() {
    let a = event(1, AuditAction::Started);
    let b = event(1, AuditAction::Started);
    assert_ne!(a.event_id, b.event_id);
}

#[test]
fn test_audit_event_serializes_statuses() {
    let json = serde_json::to_value(event(4, AuditAction::RetryScheduled)).unwrap();
    assert_eq!(json["action"], "retry_scheduled");
    assert_eq!(json["to"], "PENDING");
}
