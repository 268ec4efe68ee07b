//! Bounded worker pool keyed by task id.
//!
//! The pool owns the in-flight map (task id -> tokio join handle). It is the
//! only scheduler state shared across threads outside the store, and every
//! access goes through one `parking_lot::Mutex`.
//!
//! # Example
//!
//! ```rust,ignore
//! let pool = WorkerPool::new(10);
//! pool.submit(task_id, async move { executor.run(task_id).await })?;
//! pool.cancel(task_id); // true if a running slot was interrupted
//! pool.reconcile();     // frees slots whose work has finished
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::task::TaskId;
use super::SchedulerError;

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Maximum number of concurrent slots.
    pub capacity: usize,
    /// Slots currently held (including finished, not yet reconciled).
    pub in_flight: usize,
    /// Total successful submissions.
    pub submitted: u64,
    /// Total slots interrupted by cancellation.
    pub cancelled: u64,
    /// Total finished slots released by reconciliation.
    pub reconciled: u64,
    /// Total submissions refused because the pool was full.
    pub rejected: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    cancelled: AtomicU64,
    reconciled: AtomicU64,
    rejected: AtomicU64,
}

/// Fixed-size set of execution slots.
pub struct WorkerPool {
    capacity: usize,
    in_flight: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    counters: PoolCounters,
    shutdown: AtomicBool,
}

impl WorkerPool {
    /// Pool with `capacity` slots. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_flight: Mutex::new(HashMap::new()),
            counters: PoolCounters::default(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Maximum number of concurrent slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of held slots.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Whether another submission would be accepted right now. Slots whose
    /// work has finished count as free.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        if self.shutdown.load(Ordering::Acquire) {
            return false;
        }
        let live = self
            .in_flight
            .lock()
            .values()
            .filter(|handle| !handle.is_finished())
            .count();
        live < self.capacity
    }

    /// Whether `task_id` holds a slot whose work has not finished.
    #[must_use]
    pub fn is_in_flight(&self, task_id: TaskId) -> bool {
        self.in_flight
            .lock()
            .get(&task_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn `work` in a slot keyed by `task_id`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::PoolShutdown`] after [`WorkerPool::shutdown`];
    /// - [`SchedulerError::Conflict`] if `task_id` already holds a live slot;
    /// - [`SchedulerError::CapacityExceeded`] if every slot is held.
    pub fn submit<F>(&self, task_id: TaskId, work: F) -> Result<AbortHandle, SchedulerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut in_flight = self.in_flight.lock();
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::PoolShutdown);
        }
        if in_flight.get(&task_id).is_some_and(|h| !h.is_finished()) {
            return Err(SchedulerError::Conflict(task_id));
        }
        self.prune(&mut in_flight);
        if in_flight.len() >= self.capacity {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(SchedulerError::CapacityExceeded);
        }

        let handle = tokio::spawn(work);
        let abort = handle.abort_handle();
        in_flight.insert(task_id, handle);
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(task_id, in_flight = in_flight.len(), "slot assigned");
        Ok(abort)
    }

    /// Interrupt the slot held by `task_id`.
    ///
    /// Returns whether unfinished work was actually interrupted. The slot is
    /// released either way.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let Some(handle) = self.in_flight.lock().remove(&task_id) else {
            return false;
        };
        if handle.is_finished() {
            return false;
        }
        handle.abort();
        self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(task_id, "slot interrupted");
        true
    }

    /// Release slots whose work has finished. Returns how many were freed.
    pub fn reconcile(&self) -> usize {
        self.prune(&mut self.in_flight.lock())
    }

    fn prune(&self, in_flight: &mut HashMap<TaskId, JoinHandle<()>>) -> usize {
        let before = in_flight.len();
        in_flight.retain(|_, handle| !handle.is_finished());
        let freed = before - in_flight.len();
        if freed > 0 {
            self.counters
                .reconciled
                .fetch_add(freed as u64, Ordering::Relaxed);
            debug!(freed, "reconciled finished slots");
        }
        freed
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            in_flight: self.in_flight(),
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            reconciled: self.counters.reconciled.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work, wait up to `grace` for held slots, then abort
    /// whatever is still running. Returns the number of aborted slots.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return 0;
        }
        info!(in_flight = self.in_flight(), "shutting down worker pool");

        let drained: Vec<(TaskId, JoinHandle<()>)> = self.in_flight.lock().drain().collect();
        let aborts: Vec<(TaskId, AbortHandle)> = drained
            .iter()
            .map(|(id, handle)| (*id, handle.abort_handle()))
            .collect();

        let wait_all = futures::future::join_all(drained.into_iter().map(|(_, handle)| handle));
        if tokio::time::timeout(grace, wait_all).await.is_ok() {
            info!("worker pool shut down cleanly");
            return 0;
        }

        let mut aborted = 0;
        for (task_id, abort) in aborts {
            if !abort.is_finished() {
                abort.abort();
                aborted += 1;
                warn!(task_id, "slot did not finish within grace period - aborted");
            }
        }
        info!(aborted, "worker pool shut down");
        aborted
    }
}
