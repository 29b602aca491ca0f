//! Refresh Policies
//!
//! Reload cached values from the backing store ahead of reads.

use std::time::Duration;

use crate::backing::{BackingStore, Deadline};
use crate::error::{CacheError, Result, StoreResult};
use crate::tasks::{Job, Scheduler, TaskHandle};

// == Refreshable ==
/// Cache side of a refresh: overwrite a resident key with a reloaded value.
pub trait Refreshable<K, V> {
    /// Installs a freshly timestamped entry for `key` if it is still cached.
    /// Returns whether an entry was replaced.
    fn update_value(&self, key: &K, value: V) -> bool;
}

// == Refresh Policy ==
/// Decides when and how cached keys are reloaded from the backing store.
pub trait RefreshPolicy<K, V>: Send + Sync {
    /// Reloads one key. Returns whether the cached entry was replaced.
    fn refresh(
        &self,
        key: &K,
        store: &dyn BackingStore<K, V>,
        cache: &dyn Refreshable<K, V>,
        deadline: Deadline,
    ) -> StoreResult<bool>;

    /// Registers the cache's refresh sweep.
    fn schedule_sweep(&self, scheduler: &Scheduler, sweep: Job) -> Result<TaskHandle>;
}

// == Fixed Duration ==
/// Reloads every cached key at a fixed rate.
///
/// A key the backing store no longer holds keeps its cached value.
#[derive(Debug, Clone, Copy)]
pub struct FixedDurationRefresh {
    period: Duration,
}

impl FixedDurationRefresh {
    /// # Panics
    /// Panics if `period` is zero; use [`FixedDurationRefresh::try_new`] for
    /// user-supplied values.
    pub fn new(period: Duration) -> Self {
        assert!(!period.is_zero(), "Refresh period must be greater than zero");
        Self { period }
    }

    pub fn try_new(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(CacheError::InvalidConfig(
                "Refresh period must be greater than zero".to_string(),
            ));
        }
        Ok(Self { period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl<K, V> RefreshPolicy<K, V> for FixedDurationRefresh {
    fn refresh(
        &self,
        key: &K,
        store: &dyn BackingStore<K, V>,
        cache: &dyn Refreshable<K, V>,
        deadline: Deadline,
    ) -> StoreResult<bool> {
        match store.get(key, deadline)? {
            Some(value) => Ok(cache.update_value(key, value)),
            None => Ok(false),
        }
    }

    fn schedule_sweep(&self, scheduler: &Scheduler, sweep: Job) -> Result<TaskHandle> {
        scheduler.schedule_at_fixed_rate("refresh-sweep", self.period, self.period, sweep)
    }
}
