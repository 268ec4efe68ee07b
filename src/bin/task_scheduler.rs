//! Demo runner: builds a scheduler from the environment, submits a handful
//! of tasks with simulated work and waits for them to settle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use prometheus_task_scheduler::builders::SchedulerBuilder;
use prometheus_task_scheduler::config::SchedulerConfig;
use prometheus_task_scheduler::core::{AppResult, InMemoryAuditSink, TaskDraft, TaskPriority};
use prometheus_task_scheduler::runtime::{health, SchedulerRuntime, TaskStatusResponse};
use prometheus_task_scheduler::util::init_tracing;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> AppResult<()> {
    init_tracing("info");

    let cfg = SchedulerConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("loading scheduler configuration")?;
    let audit = InMemoryAuditSink::new(1_024);
    let scheduler = Arc::new(
        SchedulerBuilder::new(cfg.clone())
            .with_audit(Arc::new(audit.clone()))
            .build()?,
    );
    let runtime = SchedulerRuntime::start(Arc::clone(&scheduler));

    let now = Utc::now();
    let drafts = [
        TaskDraft::new("nightly-report").with_priority(TaskPriority::Low),
        TaskDraft::new("invoice-sync").with_priority(TaskPriority::High),
        TaskDraft::new("cache-warmup")
            .with_priority(TaskPriority::Critical)
            .with_scheduled_time(now + chrono::Duration::seconds(2)),
        TaskDraft::new("thumbnail-batch").with_description("resize uploaded images"),
    ];
    for draft in drafts {
        scheduler.create_task(draft).await?;
    }

    let urgent = scheduler
        .create_task(TaskDraft::new("hotfix-rollout").with_priority(TaskPriority::Critical))
        .await?;
    scheduler.execute_task(urgent.id).await?;

    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    loop {
        let tasks = scheduler.get_all_tasks().await?;
        if tasks.iter().all(|t| t.status.is_terminal()) {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            info!("timed out waiting for tasks to settle");
            break;
        }
        info!(health = ?health(&scheduler), "waiting for tasks");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    for task in scheduler.get_all_tasks().await? {
        let response = TaskStatusResponse::from(&task);
        println!("{}", serde_json::to_string(&response)?);
    }
    info!(events = audit.events().len(), "audit events recorded");

    runtime.shutdown(cfg.shutdown_grace()).await;
    Ok(())
}
