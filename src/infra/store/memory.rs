//! In-memory task store for development, tests and single-process use.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::core::store::selection_order;
use crate::core::{NewTask, SchedulerError, Task, TaskId, TaskStatus, TaskStore};
use crate::util::{Clock, SystemClock};

struct Tables {
    next_id: TaskId,
    tasks: BTreeMap<TaskId, Task>,
}

/// Task store keeping every row in a `BTreeMap` behind one `RwLock`.
///
/// Writes take the write lock for the whole read-modify-write, which gives
/// the per-row serialization the scheduler relies on.
pub struct InMemoryTaskStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    /// Empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty store stamping rows with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_id: 1,
                tasks: BTreeMap::new(),
            }),
            clock,
        }
    }

    /// Number of stored tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().tasks.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `task` over an existing row or as a new row.
    fn write_row(tables: &mut Tables, mut task: Task, now: DateTime<Utc>) -> Task {
        match tables.tasks.get(&task.id) {
            Some(existing) => {
                task.created_at = existing.created_at;
                task.updated_at = strictly_after(existing.updated_at, now);
            }
            None => {
                task.created_at = now;
                task.updated_at = now;
                tables.next_id = tables.next_id.max(task.id.saturating_add(1));
            }
        }
        tables.tasks.insert(task.id, task.clone());
        task
    }

    fn select<F>(&self, filter: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let mut selected: Vec<Task> = self
            .tables
            .read()
            .tasks
            .values()
            .filter(|t| filter(t))
            .cloned()
            .collect();
        selected.sort_by(selection_order);
        selected
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

/// `now`, or one microsecond after `previous` if the clock has not moved.
fn strictly_after(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, new: NewTask) -> Result<Task, SchedulerError> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        let id = tables.next_id;
        tables.next_id += 1;
        let task = Task::from_new(id, new, now);
        tables.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn get(&self, id: TaskId) -> Result<Task, SchedulerError> {
        self.tables
            .read()
            .tasks
            .get(&id)
            .cloned()
            .ok_or(SchedulerError::NotFound(id))
    }

    async fn save(&self, task: Task) -> Result<Task, SchedulerError> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        Ok(Self::write_row(&mut tables, task, now))
    }

    async fn save_if_status(
        &self,
        task: Task,
        expected: TaskStatus,
    ) -> Result<Option<Task>, SchedulerError> {
        let now = self.clock.now();
        let mut tables = self.tables.write();
        let current = tables
            .tasks
            .get(&task.id)
            .map(|t| t.status)
            .ok_or(SchedulerError::NotFound(task.id))?;
        if current != expected {
            return Ok(None);
        }
        Ok(Some(Self::write_row(&mut tables, task, now)))
    }

    async fn list(&self) -> Result<Vec<Task>, SchedulerError> {
        Ok(self.tables.read().tasks.values().cloned().collect())
    }

    async fn list_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, SchedulerError> {
        Ok(self
            .tables
            .read()
            .tasks
            .values()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect())
    }

    async fn find_ready_to_execute(&self, now: DateTime<Utc>) -> Result<Vec<Task>, SchedulerError> {
        Ok(self.select(|t| t.is_ready(now)))
    }

    async fn find_eligible_for_retry(&self) -> Result<Vec<Task>, SchedulerError> {
        Ok(self.select(Task::is_retry_eligible))
    }

    async fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>, SchedulerError> {
        let mut found: Vec<Task> = self
            .tables
            .read()
            .tasks
            .values()
            .filter(|t| t.created_at >= start && t.created_at <= end)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskPriority;
    use crate::util::ManualClock;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn new_task(name: &str, priority: TaskPriority, scheduled_time: DateTime<Utc>) -> NewTask {
        NewTask {
            name: name.into(),
            description: None,
            priority,
            scheduled_time,
            max_retries: 3,
        }
    }

    fn store_at(start: DateTime<Utc>) -> (Arc<ManualClock>, InMemoryTaskStore) {
        let clock = Arc::new(ManualClock::new(start));
        let store = InMemoryTaskStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_timestamps() {
        let (_clock, store) = store_at(t0());
        let a = store.insert(new_task("a", TaskPriority::Low, t0())).await.unwrap();
        let b = store.insert(new_task("b", TaskPriority::Low, t0())).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.created_at, t0());
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = InMemoryTaskStore::new();
        assert!(matches!(store.get(42).await, Err(SchedulerError::NotFound(42))));
    }

    #[tokio::test]
    async fn save_preserves_created_at_and_advances_updated_at() {
        let (clock, store) = store_at(t0());
        let task = store.insert(new_task("a", TaskPriority::Low, t0())).await.unwrap();

        let mut tampered = task.clone();
        tampered.created_at = t0() - Duration::days(3);
        let first = store.save(tampered).await.unwrap();
        assert_eq!(first.created_at, t0());
        assert!(first.updated_at > task.updated_at);

        let second = store.save(first.clone()).await.unwrap();
        assert!(second.updated_at > first.updated_at);

        clock.advance(Duration::seconds(10));
        let third = store.save(second).await.unwrap();
        assert_eq!(third.updated_at, t0() + Duration::seconds(10));
    }

    #[tokio::test]
    async fn ready_query_orders_by_priority_then_time() {
        let (_clock, store) = store_at(t0());
        let low = store
            .insert(new_task("low", TaskPriority::Low, t0() - Duration::seconds(10)))
            .await
            .unwrap();
        let high_late = store
            .insert(new_task("high-late", TaskPriority::High, t0() - Duration::seconds(1)))
            .await
            .unwrap();
        let high_early = store
            .insert(new_task("high-early", TaskPriority::High, t0() - Duration::seconds(5)))
            .await
            .unwrap();
        store
            .insert(new_task("future", TaskPriority::Critical, t0() + Duration::hours(1)))
            .await
            .unwrap();

        let ready: Vec<TaskId> = store
            .find_ready_to_execute(t0())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ready, vec![high_early.id, high_late.id, low.id]);
    }

    #[tokio::test]
    async fn retry_query_selects_retrying_under_limit() {
        let (_clock, store) = store_at(t0());
        let mut eligible = store.insert(new_task("a", TaskPriority::Low, t0())).await.unwrap();
        eligible.status = TaskStatus::Retrying;
        eligible.retry_count = 1;
        store.save(eligible.clone()).await.unwrap();

        let mut exhausted = store.insert(new_task("b", TaskPriority::Low, t0())).await.unwrap();
        exhausted.status = TaskStatus::Retrying;
        exhausted.retry_count = 3;
        store.save(exhausted).await.unwrap();

        let mut failed = store.insert(new_task("c", TaskPriority::Low, t0())).await.unwrap();
        failed.status = TaskStatus::Failed;
        failed.retry_count = 1;
        store.save(failed).await.unwrap();

        let ids: Vec<TaskId> = store
            .find_eligible_for_retry()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![eligible.id]);
    }

    #[tokio::test]
    async fn save_if_status_is_a_compare_and_set() {
        let (_clock, store) = store_at(t0());
        let task = store.insert(new_task("a", TaskPriority::Low, t0())).await.unwrap();

        let mut queued = task.clone();
        queued.status = TaskStatus::Queued;
        assert!(store
            .save_if_status(queued.clone(), TaskStatus::Pending)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .save_if_status(queued, TaskStatus::Pending)
            .await
            .unwrap()
            .is_none());

        let mut ghost = task;
        ghost.id = 99;
        assert!(matches!(
            store.save_if_status(ghost, TaskStatus::Pending).await,
            Err(SchedulerError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn status_and_creation_queries() {
        let (clock, store) = store_at(t0());
        let first = store.insert(new_task("a", TaskPriority::Low, t0())).await.unwrap();
        clock.advance(Duration::minutes(5));
        let second = store.insert(new_task("b", TaskPriority::Low, t0())).await.unwrap();
        clock.advance(Duration::minutes(5));
        let mut third = store.insert(new_task("c", TaskPriority::Low, t0())).await.unwrap();
        third.status = TaskStatus::Cancelled;
        store.save(third.clone()).await.unwrap();

        let pending = store.list_by_status(&[TaskStatus::Pending]).await.unwrap();
        assert_eq!(pending.len(), 2);
        let terminal = store
            .list_by_status(&[TaskStatus::Cancelled, TaskStatus::Completed])
            .await
            .unwrap();
        assert_eq!(terminal[0].id, third.id);

        let window = store
            .find_created_between(t0(), t0() + Duration::minutes(5))
            .await
            .unwrap();
        let ids: Vec<TaskId> = window.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn upsert_of_unknown_row_reserves_its_id() {
        let (_clock, store) = store_at(t0());
        let seed = store.insert(new_task("a", TaskPriority::Low, t0())).await.unwrap();
        let mut imported = seed;
        imported.id = 10;
        store.save(imported).await.unwrap();
        let next = store.insert(new_task("b", TaskPriority::Low, t0())).await.unwrap();
        assert_eq!(next.id, 11);
    }
}
