//! Cache Module
//!
//! Provides the bounded LRU store and the cache that composes it with the
//! backing store and the expiration, write and refresh policies.

mod engine;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use engine::Cache;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use lru::RecencyList;
pub use stats::{CacheStats, StatsRecorder};
pub use store::BoundedStore;
