//! Cache Engine
//!
//! Composes the bounded store with a backing store and the expiration, write
//! propagation and refresh policies.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backing::{BackingStore, Deadline};
use crate::cache::{current_timestamp_ms, BoundedStore, CacheEntry, CacheStats, StatsRecorder};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::policy::{ExpirationPolicy, RefreshPolicy, Refreshable, WritePolicy};
use crate::tasks::{Scheduler, TaskHandle};

/// State shared between the foreground handle and the scheduled sweeps.
struct CacheInner<K, V> {
    store: BoundedStore<K, V>,
    backing: Arc<dyn BackingStore<K, V>>,
    expiration: Arc<dyn ExpirationPolicy<V>>,
    write_policy: Arc<dyn WritePolicy<K, V>>,
    refresh: Arc<dyn RefreshPolicy<K, V>>,
    stats: StatsRecorder,
    store_timeout: Option<Duration>,
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn deadline(&self) -> Deadline {
        Deadline::from_timeout(self.store_timeout)
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        self.write_policy
            .write(&key, &value, self.backing.as_ref(), self.deadline())?;

        let entry = CacheEntry::new(value);
        self.expiration.on_write(&entry);

        if self.store.put(key, entry).is_some() {
            debug!(capacity = self.store.capacity(), "Evicted least recently used entry");
        }
        Ok(())
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        if let Some(entry) = self.store.get(key) {
            self.expiration.on_read(&entry);
            self.stats.record_hit();
            return Ok(Some(entry.value().clone()));
        }

        self.stats.record_miss();
        match self.backing.get(key, self.deadline())? {
            Some(value) => {
                self.put(key.clone(), value.clone())?;
                self.stats.record_load();
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn load_from_store(&self) -> Result<usize> {
        let keys = self
            .backing
            .top_keys(self.store.capacity(), self.deadline())?;

        let mut loaded = 0;
        for key in keys {
            if let Some(value) = self.backing.get(&key, self.deadline())? {
                self.put(key, value)?;
                self.stats.record_load();
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    fn expire_sweep(&self) -> usize {
        let now = current_timestamp_ms();
        let expiration = &self.expiration;
        let removed = self
            .store
            .remove_if(|_, entry| expiration.is_expired(entry, now));

        if removed > 0 {
            self.stats.record_expirations(removed);
            debug!(removed, remaining = self.store.len(), "Expiration sweep removed entries");
        }
        removed
    }

    fn refresh_sweep(&self) -> usize {
        let keys = self.store.keys();
        let total = keys.len();
        let mut refreshed = 0;

        for key in keys {
            match self
                .refresh
                .refresh(&key, self.backing.as_ref(), self, self.deadline())
            {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(err) => warn!(error = %err, "Refresh failed for a cached key; keeping current value"),
            }
        }

        debug!(refreshed, total, "Refresh sweep finished");
        refreshed
    }
}

impl<K, V> Refreshable<K, V> for CacheInner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn update_value(&self, key: &K, value: V) -> bool {
        let replaced = self.store.replace(key, CacheEntry::new(value));
        if replaced {
            self.stats.record_refresh();
        }
        replaced
    }
}

// == Cache ==
/// Read-through cache with LRU eviction in front of a [`BackingStore`].
///
/// On construction the cache registers its expiration sweep, refresh sweep and
/// (for write-back) flush on the scheduler, then fills itself from the
/// backing store. Dropping the cache cancels those tasks; the scheduler itself
/// belongs to the host application.
///
/// # Example
/// ```ignore
/// let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default())?);
/// let cache = Cache::new(config, Arc::new(InMemoryStore::new()), scheduler)?;
/// cache.put("key1".to_string(), "value1".to_string())?;
/// assert_eq!(cache.get(&"key1".to_string())?, Some("value1".to_string()));
/// ```
pub struct Cache<K, V> {
    inner: Arc<CacheInner<K, V>>,
    tasks: Vec<TaskHandle>,
    scheduler: Arc<Scheduler>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Builds the cache, schedules its background work and performs the
    /// initial load.
    ///
    /// A synchronous initial load that fails fails construction; an
    /// asynchronous one logs the failure and leaves the cache as loaded so far.
    pub fn new(
        config: CacheConfig<K, V>,
        backing: Arc<dyn BackingStore<K, V>>,
        scheduler: Arc<Scheduler>,
    ) -> Result<Self> {
        let inner = Arc::new(CacheInner {
            store: BoundedStore::new(config.max_capacity())?,
            backing,
            expiration: Arc::clone(config.expiration()),
            write_policy: Arc::clone(config.write_policy()),
            refresh: Arc::clone(config.refresh()),
            stats: StatsRecorder::new(),
            store_timeout: config.store_timeout(),
        });

        // Tasks are collected on the cache so an early return cancels them
        let mut cache = Self {
            inner,
            tasks: Vec::with_capacity(4),
            scheduler,
        };
        cache.schedule_background_work()?;

        if config.async_load() {
            let weak = Arc::downgrade(&cache.inner);
            let handle = cache.scheduler.run_async("initial-load", move || {
                let Some(inner) = weak.upgrade() else {
                    return Ok(());
                };
                let loaded = inner.load_from_store()?;
                info!(loaded, "Background initial load finished");
                Ok(())
            })?;
            cache.tasks.push(handle);
        } else {
            let loaded = cache.inner.load_from_store()?;
            info!(loaded, "Initial load finished");
        }

        info!(
            capacity = cache.inner.store.capacity(),
            entries = cache.inner.store.len(),
            "Cache initialized"
        );
        Ok(cache)
    }

    fn schedule_background_work(&mut self) -> Result<()> {
        let weak = Arc::downgrade(&self.inner);
        let handle = self
            .inner
            .expiration
            .schedule_sweep(&self.scheduler, sweep_job(weak, |inner| {
                inner.expire_sweep();
            }))?;
        self.tasks.push(handle);

        if let Some(handle) = self.inner.write_policy.schedule_flush(
            &self.scheduler,
            Arc::clone(&self.inner.backing),
            self.inner.store_timeout,
        )? {
            self.tasks.push(handle);
        }

        let weak = Arc::downgrade(&self.inner);
        let handle = self
            .inner
            .refresh
            .schedule_sweep(&self.scheduler, sweep_job(weak, |inner| {
                inner.refresh_sweep();
            }))?;
        self.tasks.push(handle);

        Ok(())
    }

    // == Put ==
    /// Propagates the write according to the write policy, then installs a
    /// fresh entry. If propagation fails the entry is not installed.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        self.inner.put(key, value)
    }

    // == Get ==
    /// Returns the cached value, falling back to the backing store on a miss.
    ///
    /// A value found in the backing store is installed as if by [`Cache::put`].
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.inner.get(key)
    }

    // == Remove ==
    /// Removes the key from the cache only; the backing store is untouched.
    pub fn remove(&self, key: &K) -> bool {
        self.inner.store.remove(key).is_some()
    }

    pub fn size(&self) -> usize {
        self.inner.store.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.store.capacity()
    }

    /// Whether `key` is cached. Does not affect recency or expiration.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.store.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner
            .stats
            .snapshot(self.inner.store.evictions(), self.inner.store.len())
    }

    // == Maintenance ==
    /// Pushes buffered writes to the backing store now. Returns how many were
    /// written; always 0 under write-through.
    pub fn flush(&self) -> usize {
        self.inner
            .write_policy
            .flush(self.inner.backing.as_ref(), self.inner.deadline())
    }

    /// Writes accepted but not yet propagated to the backing store.
    pub fn pending_writes(&self) -> usize {
        self.inner.write_policy.pending()
    }

    /// Loads up to `capacity` keys from the backing store. Returns how many
    /// values were installed.
    pub fn load_from_store(&self) -> Result<usize> {
        self.inner.load_from_store()
    }

    /// Removes every entry the expiration policy classifies as expired.
    pub fn expire_sweep(&self) -> usize {
        self.inner.expire_sweep()
    }

    /// Applies the refresh policy to every key cached when the sweep starts.
    pub fn refresh_sweep(&self) -> usize {
        self.inner.refresh_sweep()
    }
}

/// Wraps a sweep so a tick after the cache is dropped does nothing.
fn sweep_job<K, V, F>(weak: Weak<CacheInner<K, V>>, sweep: F) -> crate::tasks::Job
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: Fn(&CacheInner<K, V>) + Send + Sync + 'static,
{
    Arc::new(move || -> Result<()> {
        if let Some(inner) = weak.upgrade() {
            sweep(&inner);
        }
        Ok(())
    })
}

impl<K, V> Drop for Cache<K, V> {
    fn drop(&mut self) {
        // Drain write-back before the flush task goes away
        let deadline = Deadline::from_timeout(self.inner.store_timeout);
        let written = self
            .inner
            .write_policy
            .flush(self.inner.backing.as_ref(), deadline);
        let pending = self.inner.write_policy.pending();
        if pending > 0 {
            warn!(written, pending, "Cache dropped with writes not yet propagated");
        } else if written > 0 {
            debug!(written, "Flushed buffered writes on drop");
        }

        for task in &self.tasks {
            task.cancel();
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("size", &self.inner.store.len())
            .field("capacity", &self.inner.store.capacity())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
