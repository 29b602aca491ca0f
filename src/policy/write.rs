//! Write Propagation Policies
//!
//! Decide when a value written to the cache reaches the backing store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backing::{BackingStore, Deadline};
use crate::error::{CacheError, Result, StoreResult};
use crate::tasks::{Scheduler, TaskHandle};

// == Write Policy ==
/// Hook invoked by every cache write before the new entry is installed.
pub trait WritePolicy<K, V>: Send + Sync {
    /// Propagates (or schedules propagation of) one write.
    fn write(
        &self,
        key: &K,
        value: &V,
        store: &dyn BackingStore<K, V>,
        deadline: Deadline,
    ) -> StoreResult<()>;

    /// Registers any background work the policy needs. `store_timeout`
    /// bounds each background tick's backing-store calls.
    fn schedule_flush(
        &self,
        _scheduler: &Scheduler,
        _store: Arc<dyn BackingStore<K, V>>,
        _store_timeout: Option<Duration>,
    ) -> Result<Option<TaskHandle>> {
        Ok(None)
    }

    /// Pushes buffered writes to the store now. Returns how many were written.
    fn flush(&self, _store: &dyn BackingStore<K, V>, _deadline: Deadline) -> usize {
        0
    }

    /// Number of writes not yet propagated.
    fn pending(&self) -> usize {
        0
    }
}

// == Write Through ==
/// Writes synchronously to the backing store inside the caller's `put`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteThrough;

impl<K, V> WritePolicy<K, V> for WriteThrough {
    fn write(
        &self,
        key: &K,
        value: &V,
        store: &dyn BackingStore<K, V>,
        deadline: Deadline,
    ) -> StoreResult<()> {
        store.put(key, value, deadline)
    }
}

// == Write Buffer ==
/// Pending writes keyed by cache key. Each value carries the sequence number
/// of the write that produced it so a flush never drops a newer value.
#[derive(Debug)]
struct WriteBuffer<K, V> {
    pending: Mutex<HashMap<K, (u64, V)>>,
    next_seq: AtomicU64,
}

impl<K, V> WriteBuffer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    fn buffer(&self, key: K, value: V) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(key, (seq, value));
    }

    fn len(&self) -> usize {
        self.pending.lock().len()
    }

    fn flush(&self, store: &dyn BackingStore<K, V>, deadline: Deadline) -> usize {
        let snapshot: Vec<(K, u64, V)> = self
            .pending
            .lock()
            .iter()
            .map(|(key, (seq, value))| (key.clone(), *seq, value.clone()))
            .collect();

        if snapshot.is_empty() {
            return 0;
        }

        let mut written = 0;
        let mut failed = 0;

        for (key, seq, value) in snapshot {
            match store.put(&key, &value, deadline) {
                Ok(()) => {
                    written += 1;
                    let mut pending = self.pending.lock();
                    // A newer write arrived while flushing; keep it for next tick
                    if matches!(pending.get(&key), Some((current, _)) if *current == seq) {
                        pending.remove(&key);
                    }
                }
                Err(err) => {
                    failed += 1;
                    warn!(error = %err, "Write-back flush failed for a buffered write; retrying next tick");
                }
            }
        }

        debug!(written, failed, remaining = self.len(), "Write-back flush finished");
        written
    }
}

// == Write Back ==
/// Buffers writes and flushes them to the backing store at a fixed rate.
///
/// Later writes to a buffered key replace the buffered value. A buffered write
/// stays buffered until a flush has written it successfully.
#[derive(Debug)]
pub struct WriteBack<K, V> {
    flush_interval: Duration,
    buffer: Arc<WriteBuffer<K, V>>,
}

impl<K, V> WriteBack<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// # Panics
    /// Panics if `flush_interval` is zero; use [`WriteBack::try_new`] for
    /// user-supplied values.
    pub fn new(flush_interval: Duration) -> Self {
        assert!(
            !flush_interval.is_zero(),
            "Write-back flush interval must be greater than zero"
        );
        Self {
            flush_interval,
            buffer: Arc::new(WriteBuffer::new()),
        }
    }

    pub fn try_new(flush_interval: Duration) -> Result<Self> {
        if flush_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "Write-back flush interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self::new(flush_interval))
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

impl<K, V> WritePolicy<K, V> for WriteBack<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn write(
        &self,
        key: &K,
        value: &V,
        _store: &dyn BackingStore<K, V>,
        _deadline: Deadline,
    ) -> StoreResult<()> {
        self.buffer.buffer(key.clone(), value.clone());
        Ok(())
    }

    fn schedule_flush(
        &self,
        scheduler: &Scheduler,
        store: Arc<dyn BackingStore<K, V>>,
        store_timeout: Option<Duration>,
    ) -> Result<Option<TaskHandle>> {
        let buffer = Arc::clone(&self.buffer);
        let handle = scheduler.schedule_at_fixed_rate(
            "write-back-flush",
            self.flush_interval,
            self.flush_interval,
            Arc::new(move || -> Result<()> {
                buffer.flush(store.as_ref(), Deadline::from_timeout(store_timeout));
                Ok(())
            }),
        )?;
        Ok(Some(handle))
    }

    fn flush(&self, store: &dyn BackingStore<K, V>, deadline: Deadline) -> usize {
        self.buffer.flush(store, deadline)
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }
}
