//! Background Tasks Module
//!
//! Worker pool that runs the cache's periodic maintenance.
//!
//! # Tasks
//! - Expiration sweep: removes entries the expiration policy marks stale
//! - Refresh sweep: reloads cached keys from the backing store
//! - Write-back flush: drains buffered writes to the backing store
//! - Initial load: fills the cache from the backing store in the background

mod scheduler;

pub use scheduler::{Job, Scheduler, TaskHandle};
