//! Background dispatcher loop bound to a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::TaskScheduler;

/// Keeps the dispatcher ticking in the background until shut down.
pub struct SchedulerRuntime {
    scheduler: Arc<TaskScheduler>,
    shutdown_tx: watch::Sender<bool>,
    dispatcher_loop: JoinHandle<()>,
}

impl SchedulerRuntime {
    /// Spawn the dispatcher loop for `scheduler`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(scheduler: Arc<TaskScheduler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = scheduler.dispatcher();
        let dispatcher_loop = tokio::spawn(dispatcher.run(shutdown_rx));
        Self {
            scheduler,
            shutdown_tx,
            dispatcher_loop,
        }
    }

    /// The scheduler being driven.
    #[must_use]
    pub fn scheduler(&self) -> Arc<TaskScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Whether the dispatcher loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.dispatcher_loop.is_finished()
    }

    /// Stop the dispatcher loop, then drain the worker pool, aborting work
    /// still running after `grace`. Returns the number of aborted tasks.
    pub async fn shutdown(self, grace: Duration) -> usize {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.dispatcher_loop.await {
            warn!(error = %e, "dispatcher loop ended abnormally");
        }
        let aborted = self.scheduler.shutdown(grace).await;
        info!(aborted, "scheduler runtime stopped");
        aborted
    }
}
