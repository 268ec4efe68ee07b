//! Builder that wires a [`TaskScheduler`] from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::SchedulerConfig;
use crate::core::audit::AuditTrail;
use crate::core::{
    AuditSink, Dispatcher, Executor, RetryPolicy, SchedulerError, SimulatedWork, TaskScheduler,
    TaskStore, TaskWork, WorkerPool,
};
use crate::infra::{CachedTaskStore, InMemoryTaskStore};
use crate::util::{Clock, SystemClock};

/// Assemble a scheduler from a [`SchedulerConfig`] plus optional
/// replacements for the store, the work, the clock and the audit sink.
///
/// Unset parts default to an in-memory store, [`SimulatedWork`] built from
/// `config.work`, the system clock and no audit trail.
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
///     .with_work(Arc::new(MyWork))
///     .build()?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    store: Option<Arc<dyn TaskStore>>,
    work: Option<Arc<dyn TaskWork>>,
    clock: Option<Arc<dyn Clock>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl SchedulerBuilder {
    /// Start from `config`.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            store: None,
            work: None,
            clock: None,
            audit: None,
        }
    }

    /// Use `store` instead of a fresh in-memory store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `work` instead of [`SimulatedWork`].
    #[must_use]
    pub fn with_work(mut self, work: Arc<dyn TaskWork>) -> Self {
        self.work = Some(work);
        self
    }

    /// Use `clock` for every timestamp and readiness check.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Emit lifecycle events to `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Validate the configuration and build the scheduler.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Validation`] if the configuration is invalid.
    pub fn build(self) -> Result<TaskScheduler, SchedulerError> {
        let cfg = self.config;
        cfg.validate()
            .map_err(|e| SchedulerError::Validation(format!("config invalid: {e}")))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::with_clock(Arc::clone(&clock))));
        let store: Arc<dyn TaskStore> = if cfg.cache_enabled {
            Arc::new(CachedTaskStore::new(store))
        } else {
            store
        };
        let work = self
            .work
            .unwrap_or_else(|| Arc::new(SimulatedWork::from(&cfg.work)));
        let audit = AuditTrail::new(self.audit);

        let pool = Arc::new(WorkerPool::new(cfg.max_concurrency));
        let executor = Arc::new(Executor::new(
            Arc::clone(&store),
            work,
            RetryPolicy,
            Arc::clone(&clock),
            audit.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&pool),
            executor,
            Arc::clone(&clock),
            audit.clone(),
            cfg.tick_interval(),
        ));

        info!(
            max_concurrency = cfg.max_concurrency,
            tick_interval_ms = cfg.tick_interval_ms,
            cache_enabled = cfg.cache_enabled,
            "scheduler built"
        );
        Ok(TaskScheduler::new(
            store,
            pool,
            dispatcher,
            clock,
            audit,
            cfg.default_max_retries,
        ))
    }
}
