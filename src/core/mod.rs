//! Task model, lifecycle rules and the scheduling engine.

pub mod audit;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod retry;
pub mod scheduler;
pub mod state_machine;
pub mod store;
pub mod task;
pub mod worker_pool;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use dispatcher::{Dispatcher, TickReport};
pub use error::{AppResult, SchedulerError, WorkError};
pub use executor::{Executor, SimulatedWork, TaskWork, SIMULATED_RESULT};
pub use retry::{RetryDecision, RetryPolicy, RETRIES_EXHAUSTED_PREFIX};
pub use scheduler::TaskScheduler;
pub use state_machine::{can_transition, transition};
pub use store::TaskStore;
pub use task::{NewTask, Task, TaskDraft, TaskId, TaskPriority, TaskStatus, DEFAULT_MAX_RETRIES};
pub use worker_pool::{PoolStats, WorkerPool};
