//! Tests for the runtime handle and API models

use std::sync::Arc;
use std::time::Duration;

use prometheus_task_scheduler::builders::SchedulerBuilder;
use prometheus_task_scheduler::config::SchedulerConfig;
use prometheus_task_scheduler::core::{TaskDraft, TaskStatus};
use prometheus_task_scheduler::runtime::{health, SchedulerRuntime, StatusUpdate, TaskStatusResponse};

fn scheduler() -> Arc<prometheus_task_scheduler::core::TaskScheduler> {
    Arc::new(
        SchedulerBuilder::new(SchedulerConfig {
            tick_interval_ms: 60_000,
            max_concurrency: 2,
            ..SchedulerConfig::default()
        })
        .build()
        .unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runtime_start_and_shutdown() {
    let runtime = SchedulerRuntime::start(scheduler());
    assert!(runtime.is_running());
    assert_eq!(runtime.shutdown(Duration::from_millis(50)).await, 0);
}

#[tokio::test]
async fn test_health_reports_pool_usage() {
    let scheduler = scheduler();
    let h = health(&scheduler);
    assert!(h.ok);
    assert_eq!(h.capacity, 2);
    assert_eq!(h.in_flight, 0);
}

#[tokio::test]
async fn test_status_response_from_task() {
    let scheduler = scheduler();
    let task = scheduler.create_task(TaskDraft::new("api")).await.unwrap();

    let response = TaskStatusResponse::from(&task);
    assert_eq!(response.task_id, task.id);
    assert_eq!(response.status, TaskStatus::Pending);

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["taskId"], task.id);
    assert_eq!(json["status"], "PENDING");
}

#[test]
fn test_status_update_parses() {
    let update: StatusUpdate = serde_json::from_str(r#"{"status":"QUEUED"}"#).unwrap();
    assert_eq!(update.status, TaskStatus::Queued);
}
