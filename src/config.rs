//! Configuration Module
//!
//! Cache configuration (capacity and policies) and scheduler configuration.

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::policy::{ExpirationPolicy, RefreshPolicy, WritePolicy};

/// Capacity used when the builder is not given one.
pub const DEFAULT_MAX_CAPACITY: usize = 10;

/// Worker threads used by the scheduler unless configured otherwise.
pub const DEFAULT_SCHEDULER_WORKERS: usize = 4;

/// Grace period granted to in-flight jobs on scheduler shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// == Cache Config ==
/// Immutable cache configuration, consumed once by [`Cache::new`].
///
/// [`Cache::new`]: crate::cache::Cache::new
pub struct CacheConfig<K, V> {
    max_capacity: usize,
    expiration: Arc<dyn ExpirationPolicy<V>>,
    write_policy: Arc<dyn WritePolicy<K, V>>,
    refresh: Arc<dyn RefreshPolicy<K, V>>,
    async_load: bool,
    store_timeout: Option<Duration>,
}

impl<K, V> CacheConfig<K, V> {
    pub fn builder() -> CacheConfigBuilder<K, V> {
        CacheConfigBuilder::new()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn expiration(&self) -> &Arc<dyn ExpirationPolicy<V>> {
        &self.expiration
    }

    pub fn write_policy(&self) -> &Arc<dyn WritePolicy<K, V>> {
        &self.write_policy
    }

    pub fn refresh(&self) -> &Arc<dyn RefreshPolicy<K, V>> {
        &self.refresh
    }

    pub fn async_load(&self) -> bool {
        self.async_load
    }

    /// Budget for each backing-store call, `None` to wait indefinitely.
    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout
    }
}

impl<K, V> fmt::Debug for CacheConfig<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("max_capacity", &self.max_capacity)
            .field("async_load", &self.async_load)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

// == Cache Config Builder ==
/// Builder for [`CacheConfig`]. The three policies are mandatory.
///
/// # Example
/// ```ignore
/// let config = CacheConfig::builder()
///     .max_capacity(2)
///     .expiration(Arc::new(SinceCreation::new(Duration::from_secs(1))))
///     .write_policy(Arc::new(WriteThrough))
///     .refresh(Arc::new(FixedDurationRefresh::new(Duration::from_secs(2))))
///     .build()?;
/// ```
pub struct CacheConfigBuilder<K, V> {
    max_capacity: usize,
    expiration: Option<Arc<dyn ExpirationPolicy<V>>>,
    write_policy: Option<Arc<dyn WritePolicy<K, V>>>,
    refresh: Option<Arc<dyn RefreshPolicy<K, V>>>,
    async_load: bool,
    store_timeout: Option<Duration>,
}

impl<K, V> Default for CacheConfigBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheConfigBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            expiration: None,
            write_policy: None,
            refresh: None,
            async_load: false,
            store_timeout: None,
        }
    }

    pub fn max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn expiration(mut self, policy: Arc<dyn ExpirationPolicy<V>>) -> Self {
        self.expiration = Some(policy);
        self
    }

    pub fn write_policy(mut self, policy: Arc<dyn WritePolicy<K, V>>) -> Self {
        self.write_policy = Some(policy);
        self
    }

    pub fn refresh(mut self, policy: Arc<dyn RefreshPolicy<K, V>>) -> Self {
        self.refresh = Some(policy);
        self
    }

    /// Load the cache from the backing store in the background instead of
    /// during construction.
    pub fn async_load(mut self, async_load: bool) -> Self {
        self.async_load = async_load;
        self
    }

    /// Bounds each backing-store call. A timeout past the representable
    /// range behaves as no timeout.
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    // == Build ==
    /// Validates the configuration. Nothing is defaulted silently: a zero
    /// capacity or a missing policy is an error.
    pub fn build(self) -> Result<CacheConfig<K, V>> {
        if self.max_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "Max capacity must be greater than zero".to_string(),
            ));
        }
        if matches!(self.store_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "Store timeout must be greater than zero".to_string(),
            ));
        }

        Ok(CacheConfig {
            max_capacity: self.max_capacity,
            expiration: self
                .expiration
                .ok_or(CacheError::MissingPolicy("expiration"))?,
            write_policy: self
                .write_policy
                .ok_or(CacheError::MissingPolicy("write propagation"))?,
            refresh: self.refresh.ok_or(CacheError::MissingPolicy("refresh"))?,
            async_load: self.async_load,
            store_timeout: self.store_timeout,
        })
    }
}

// == Scheduler Config ==
/// Worker pool configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads running background jobs
    pub worker_threads: usize,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_grace: Duration,
}

impl SchedulerConfig {
    /// Creates a new SchedulerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SCHEDULER_WORKERS` - Worker threads (default: 4)
    /// - `CACHE_SHUTDOWN_GRACE_MS` - Shutdown grace period in milliseconds (default: 5000)
    pub fn from_env() -> Self {
        Self {
            worker_threads: env::var("CACHE_SCHEDULER_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SCHEDULER_WORKERS),
            shutdown_grace: env::var("CACHE_SHUTDOWN_GRACE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_SCHEDULER_WORKERS,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}
