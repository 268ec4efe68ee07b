//! Tests for builder modules

use std::sync::Arc;

use prometheus_task_scheduler::builders::SchedulerBuilder;
use prometheus_task_scheduler::config::{SchedulerConfig, WorkConfig};
use prometheus_task_scheduler::core::{InMemoryAuditSink, SchedulerError, TaskDraft, TaskStore};
use prometheus_task_scheduler::infra::InMemoryTaskStore;

#[test]
fn test_builder_defaults() {
    let scheduler = SchedulerBuilder::new(SchedulerConfig {
        max_concurrency: 3,
        ..SchedulerConfig::default()
    })
    .build()
    .unwrap();

    let stats = scheduler.pool_stats();
    assert_eq!(stats.capacity, 3);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(
        scheduler.dispatcher().tick_interval(),
        std::time::Duration::from_secs(5)
    );
}

#[test]
fn test_builder_rejects_invalid_work_config() {
    let result = SchedulerBuilder::new(SchedulerConfig {
        work: WorkConfig {
            failure_rate: 2.0,
            ..WorkConfig::default()
        },
        ..SchedulerConfig::default()
    })
    .build();
    assert!(matches!(result, Err(SchedulerError::Validation(_))));
}

#[tokio::test]
async fn test_builder_uses_supplied_store_and_audit() {
    let store = Arc::new(InMemoryTaskStore::new());
    let audit = InMemoryAuditSink::new(16);
    let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
        .with_store(store.clone())
        .with_audit(Arc::new(audit.clone()))
        .build()
        .unwrap();

    let task = scheduler.create_task(TaskDraft::new("shared")).await.unwrap();
    assert_eq!(store.get(task.id).await.unwrap().name, "shared");
    assert_eq!(audit.events_for(task.id).len(), 1);
}
