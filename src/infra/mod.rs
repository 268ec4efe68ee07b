//! Infrastructure adapters: task store backends and the caching decorator.

pub mod cache;
pub mod store;

pub use cache::{CacheStats, CachedTaskStore};
pub use store::InMemoryTaskStore;
