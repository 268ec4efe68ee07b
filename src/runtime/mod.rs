//! Tokio runtime binding and API surface.

pub mod api;
pub mod handle;

pub use api::{health, Health, StatusUpdate, TaskStatusResponse};
pub use handle::SchedulerRuntime;
