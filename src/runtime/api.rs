//! API-facing request/response models for a request layer sitting in front
//! of the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{PoolStats, Task, TaskId, TaskScheduler, TaskStatus};

/// Body of a status update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Requested status.
    pub status: TaskStatus,
}

/// Task status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Attempts failed so far.
    pub retry_count: u32,
    /// Result text once completed.
    pub result: Option<String>,
    /// Reason for the latest failure.
    pub reason: Option<String>,
    /// Last persisted change.
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskStatusResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            retry_count: task.retry_count,
            result: task.result.clone(),
            reason: task.error_message.clone(),
            updated_at: task.updated_at,
        }
    }
}

/// Health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Tasks currently holding a worker slot.
    pub in_flight: usize,
    /// Worker slots in total.
    pub capacity: usize,
}

impl From<PoolStats> for Health {
    fn from(stats: PoolStats) -> Self {
        Self {
            ok: true,
            in_flight: stats.in_flight,
            capacity: stats.capacity,
        }
    }
}

/// Return a health payload for `scheduler`.
#[must_use]
pub fn health(scheduler: &TaskScheduler) -> Health {
    Health::from(scheduler.pool_stats())
}
