//! # Prometheus Task Scheduler
//!
//! A persistent task scheduler with priorities, scheduled start times,
//! bounded concurrency, retries and cooperative cancellation.
//!
//! Callers create tasks, query them, update their status and trigger or
//! cancel execution. A periodic dispatcher picks tasks that are due
//! (`PENDING` with a past scheduled time) or eligible for retry, and runs
//! them on a fixed-size worker pool. Every lifecycle change is persisted
//! immediately through a [`core::TaskStore`].
//!
//! ## Lifecycle
//!
//! ```text
//! PENDING ──► QUEUED ──► RUNNING ──► COMPLETED
//!    ▲                      │
//!    │                      ├──► RETRYING ──► QUEUED ...
//!    │                      └──► FAILED
//!  (any non-terminal) ─────────► CANCELLED
//! ```
//!
//! `COMPLETED`, `FAILED` and `CANCELLED` are terminal. A cancelled task is
//! never overwritten by work that finishes after the cancellation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_task_scheduler::builders::SchedulerBuilder;
//! use prometheus_task_scheduler::config::SchedulerConfig;
//! use prometheus_task_scheduler::core::{TaskDraft, TaskPriority};
//! use prometheus_task_scheduler::runtime::SchedulerRuntime;
//!
//! let cfg = SchedulerConfig::from_env()?;
//! let scheduler = Arc::new(SchedulerBuilder::new(cfg.clone()).build()?);
//! let runtime = SchedulerRuntime::start(Arc::clone(&scheduler));
//!
//! let task = scheduler
//!     .create_task(TaskDraft::new("reindex").with_priority(TaskPriority::High))
//!     .await?;
//! scheduler.execute_task(task.id).await?;
//!
//! runtime.shutdown(cfg.shutdown_grace()).await;
//! ```
//!
//! See `tests/scheduler_test.rs` for end-to-end scenarios.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task model, lifecycle rules and the scheduling engine.
pub mod core;
/// Configuration models for the scheduler and its simulated work.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Task store backends and the caching decorator.
pub mod infra;
/// Tokio runtime binding and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
