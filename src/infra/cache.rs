//! Read-through cache in front of a task store.
//!
//! `get` and `list` are served from memory after the first read. Every
//! mutating call goes to the inner store first and then invalidates the
//! affected entry and the cached listing. Selection queries always hit the
//! inner store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::trace;

use crate::core::{NewTask, SchedulerError, Task, TaskId, TaskStatus, TaskStore};

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from memory.
    pub hits: u64,
    /// Reads that went to the inner store.
    pub misses: u64,
}

/// Caching decorator for any [`TaskStore`].
///
/// Reads only populate the cache if no invalidation happened while they were
/// in flight, so a slow read never resurrects a stale row.
pub struct CachedTaskStore<S> {
    inner: S,
    entries: RwLock<HashMap<TaskId, Task>>,
    listing: RwLock<Option<Vec<Task>>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: TaskStore> CachedTaskStore<S> {
    /// Wrap `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            listing: RwLock::new(None),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop the cached entry for `id` and the cached listing.
    pub fn invalidate(&self, id: TaskId) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.write().remove(&id);
        *self.listing.write() = None;
        trace!(task_id = id, "cache entry invalidated");
    }

    /// Drop everything.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.write().clear();
        *self.listing.write() = None;
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for CachedTaskStore<S> {
    async fn insert(&self, new: NewTask) -> Result<Task, SchedulerError> {
        let task = self.inner.insert(new).await?;
        self.invalidate(task.id);
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Task, SchedulerError> {
        let cached = self.entries.read().get(&id).cloned();
        if let Some(task) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(task);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation.load(Ordering::Acquire);
        let task = self.inner.get(id).await?;
        let mut entries = self.entries.write();
        if self.generation.load(Ordering::Acquire) == generation {
            entries.insert(id, task.clone());
        }
        Ok(task)
    }

    async fn save(&self, task: Task) -> Result<Task, SchedulerError> {
        let id = task.id;
        let result = self.inner.save(task).await;
        self.invalidate(id);
        result
    }

    async fn save_if_status(
        &self,
        task: Task,
        expected: TaskStatus,
    ) -> Result<Option<Task>, SchedulerError> {
        let id = task.id;
        let result = self.inner.save_if_status(task, expected).await;
        self.invalidate(id);
        result
    }

    async fn list(&self) -> Result<Vec<Task>, SchedulerError> {
        let cached = self.listing.read().clone();
        if let Some(tasks) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(tasks);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation.load(Ordering::Acquire);
        let tasks = self.inner.list().await?;
        let mut listing = self.listing.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *listing = Some(tasks.clone());
        }
        Ok(tasks)
    }

    async fn list_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, SchedulerError> {
        self.inner.list_by_status(statuses).await
    }

    async fn find_ready_to_execute(&self, now: DateTime<Utc>) -> Result<Vec<Task>, SchedulerError> {
        self.inner.find_ready_to_execute(now).await
    }

    async fn find_eligible_for_retry(&self) -> Result<Vec<Task>, SchedulerError> {
        self.inner.find_eligible_for_retry().await
    }

    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, SchedulerError> {
        self.inner.find_created_between(start, end).await
    }
}
