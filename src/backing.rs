//! Backing Store Module
//!
//! The authoritative key/value source the cache sits in front of, plus a
//! simple in-memory adapter.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};

// == Deadline ==
/// Point in time by which a backing-store call should complete.
///
/// Adapters are expected to honour it and fail with [`StoreError::TimedOut`]
/// once it has passed. `Deadline::none()` means wait indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self(None)
    }

    /// A deadline `timeout` from now. A timeout too large to represent as an
    /// instant is treated as unbounded.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    /// Builds a deadline from an optional timeout.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map(Self::after).unwrap_or_default()
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.0, Some(at) if Instant::now() >= at)
    }

    /// Returns `Err(TimedOut)` if the deadline has already passed.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_expired() {
            Err(StoreError::TimedOut)
        } else {
            Ok(())
        }
    }
}

// == Backing Store ==
/// Slow, authoritative key/value store fronted by the cache.
///
/// Every call may block; the cache never holds its own locks while calling in.
pub trait BackingStore<K, V>: Send + Sync {
    fn get(&self, key: &K, deadline: Deadline) -> StoreResult<Option<V>>;

    fn put(&self, key: &K, value: &V, deadline: Deadline) -> StoreResult<()>;

    fn remove(&self, key: &K, deadline: Deadline) -> StoreResult<()>;

    /// Up to `limit` keys used for the initial cache load. Order is up to the
    /// adapter.
    fn top_keys(&self, limit: usize, deadline: Deadline) -> StoreResult<Vec<K>>;
}

// == In-Memory Store ==
/// Backing store held in a locked `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStore<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            data: RwLock::new(entries.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Reads a value directly, bypassing the `BackingStore` contract.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }
}

impl<K, V> BackingStore<K, V> for InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K, deadline: Deadline) -> StoreResult<Option<V>> {
        deadline.check()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &K, value: &V, deadline: Deadline) -> StoreResult<()> {
        deadline.check()?;
        self.data.write().insert(key.clone(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &K, deadline: Deadline) -> StoreResult<()> {
        deadline.check()?;
        self.data.write().remove(key);
        Ok(())
    }

    fn top_keys(&self, limit: usize, deadline: Deadline) -> StoreResult<Vec<K>> {
        deadline.check()?;
        Ok(self.data.read().keys().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_deadline_none_never_expires() {
        let deadline = Deadline::none();
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.check().is_ok());
    }

    #[test]
    fn test_deadline_expires() {
        let deadline = Deadline::after(Duration::from_millis(10));
        assert!(!deadline.is_expired());

        sleep(Duration::from_millis(20));

        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
        assert!(matches!(deadline.check(), Err(StoreError::TimedOut)));
    }

    #[test]
    fn test_deadline_overflowing_timeout_is_unbounded() {
        let deadline = Deadline::after(Duration::MAX);
        assert_eq!(deadline, Deadline::none());
        assert!(deadline.check().is_ok());

        assert_eq!(Deadline::from_timeout(Some(Duration::MAX)), Deadline::none());
    }

    #[test]
    fn test_in_memory_store_roundtrip() {
        let store = InMemoryStore::new();

        store.put(&"key1", &"v1", Deadline::none()).unwrap();
        assert_eq!(store.get(&"key1", Deadline::none()).unwrap(), Some("v1"));

        store.remove(&"key1", Deadline::none()).unwrap();
        assert_eq!(store.get(&"key1", Deadline::none()).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_top_keys_respects_limit() {
        let store = InMemoryStore::with_entries((0..10).map(|i| (i, i * 10)));

        let keys = store.top_keys(3, Deadline::none()).unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| store.peek(k).is_some()));

        let all = store.top_keys(100, Deadline::none()).unwrap();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_expired_deadline_rejects_call() {
        let store = InMemoryStore::with_entries([("key1", "v1")]);
        let deadline = Deadline::after(Duration::ZERO);

        assert!(matches!(
            store.get(&"key1", deadline),
            Err(StoreError::TimedOut)
        ));
    }
}
