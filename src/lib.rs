//! Tiered Cache - An in-process read-through cache
//!
//! Bounded LRU cache in front of a slower backing store, with pluggable
//! expiration, write propagation and refresh policies run on a shared
//! background scheduler.

pub mod backing;
pub mod cache;
pub mod config;
pub mod error;
pub mod policy;
pub mod tasks;

pub use backing::{BackingStore, Deadline, InMemoryStore};
pub use cache::{Cache, CacheStats};
pub use config::{CacheConfig, CacheConfigBuilder, SchedulerConfig};
pub use error::{CacheError, Result, StoreError};
pub use tasks::Scheduler;
