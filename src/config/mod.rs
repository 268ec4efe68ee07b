//! Configuration models for the scheduler and its simulated work.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, WorkConfig, ENV_PREFIX};
