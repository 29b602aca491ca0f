//! Cache Store Module
//!
//! Bounded, thread-safe map combining HashMap storage with LRU tracking.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::cache::{CacheEntry, RecencyList};
use crate::error::{CacheError, Result};

/// An entry plus its current recency stamp.
#[derive(Debug)]
struct Slot<V> {
    entry: Arc<CacheEntry<V>>,
    stamp: u64,
}

#[derive(Debug)]
struct Inner<K, V> {
    /// Key-value storage
    entries: HashMap<K, Slot<V>>,
    /// LRU access tracker
    lru: RecencyList<K>,
    /// Entries dropped to make room
    evictions: u64,
}

// == Bounded Store ==
/// Fixed-capacity map with least-recently-used eviction.
///
/// Every successful `get` and every `put` marks the key most recently used.
/// Inserting a new key at capacity evicts the least recently used key in the
/// same critical section, so `len()` never exceeds `capacity()`.
#[derive(Debug)]
pub struct BoundedStore<K, V> {
    inner: Mutex<Inner<K, V>>,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl<K, V> BoundedStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "Max capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                lru: RecencyList::new(),
                evictions: 0,
            }),
            capacity,
        })
    }

    // == Get ==
    /// Returns the entry for `key` and marks it most recently used.
    pub fn get(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
        let mut guard = self.inner.lock();
        let Inner { entries, lru, .. } = &mut *guard;

        let slot = entries.get_mut(key)?;
        slot.stamp = lru.touch(Some(slot.stamp), key.clone());
        Some(Arc::clone(&slot.entry))
    }

    /// Returns the entry for `key` without affecting recency.
    pub fn peek(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|slot| Arc::clone(&slot.entry))
    }

    // == Put ==
    /// Inserts or replaces the entry for `key` and marks it most recently used.
    ///
    /// Returns the key evicted to make room, if any.
    pub fn put(&self, key: K, entry: CacheEntry<V>) -> Option<K> {
        let entry = Arc::new(entry);
        let mut guard = self.inner.lock();
        let Inner {
            entries,
            lru,
            evictions,
        } = &mut *guard;

        if let Some(slot) = entries.get_mut(&key) {
            slot.stamp = lru.touch(Some(slot.stamp), key);
            slot.entry = entry;
            return None;
        }

        let evicted = if entries.len() >= self.capacity {
            lru.evict_oldest().map(|victim| {
                entries.remove(&victim);
                *evictions += 1;
                victim
            })
        } else {
            None
        };

        let stamp = lru.touch(None, key.clone());
        entries.insert(key, Slot { entry, stamp });

        evicted
    }

    // == Replace ==
    /// Swaps in a new entry for a key that is still present, keeping its
    /// recency position. Returns `false` if the key is absent.
    pub fn replace(&self, key: &K, entry: CacheEntry<V>) -> bool {
        match self.inner.lock().entries.get_mut(key) {
            Some(slot) => {
                slot.entry = Arc::new(entry);
                true
            }
            None => false,
        }
    }

    // == Remove ==
    /// Removes an entry by key, returning it if it was present.
    pub fn remove(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
        let mut guard = self.inner.lock();
        let Inner { entries, lru, .. } = &mut *guard;

        let slot = entries.remove(key)?;
        lru.remove(slot.stamp);
        Some(slot.entry)
    }

    // == Remove If ==
    /// Removes every entry matching `predicate`. Returns the number removed.
    pub fn remove_if<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &CacheEntry<V>) -> bool,
    {
        let mut guard = self.inner.lock();
        let Inner { entries, lru, .. } = &mut *guard;

        let before = entries.len();
        entries.retain(|key, slot| {
            if predicate(key, &slot.entry) {
                lru.remove(slot.stamp);
                false
            } else {
                true
            }
        });

        let removed = before - entries.len();
        if removed > 0 {
            trace!(removed, "Removed entries matching predicate");
        }
        removed
    }

    // == Keys ==
    /// Point-in-time snapshot of the keys; later mutations are not reflected.
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of capacity evictions so far.
    pub fn evictions(&self) -> u64 {
        self.inner.lock().evictions
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn entry(value: &str) -> CacheEntry<String> {
        CacheEntry::new(value.to_string())
    }

    fn value_of(store: &BoundedStore<String, String>, key: &str) -> Option<String> {
        store.get(&key.to_string()).map(|e| e.value().clone())
    }

    #[test]
    fn test_store_new() {
        let store: BoundedStore<String, String> = BoundedStore::new(100).unwrap();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 100);
    }

    #[test]
    fn test_store_rejects_zero_capacity() {
        let result = BoundedStore::<String, String>::new(0);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_store_put_and_get() {
        let store = BoundedStore::new(100).unwrap();

        store.put("key1".to_string(), entry("value1"));

        assert_eq!(value_of(&store, "key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = BoundedStore::<String, String>::new(100).unwrap();
        assert!(store.get(&"nonexistent".to_string()).is_none());
    }

    #[test]
    fn test_store_overwrite() {
        let store = BoundedStore::new(100).unwrap();

        store.put("key1".to_string(), entry("value1"));
        store.put("key1".to_string(), entry("value2"));

        assert_eq!(value_of(&store, "key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_remove() {
        let store = BoundedStore::new(100).unwrap();

        store.put("key1".to_string(), entry("value1"));
        assert!(store.remove(&"key1".to_string()).is_some());
        assert!(store.remove(&"key1".to_string()).is_none());

        assert!(store.is_empty());
        assert!(value_of(&store, "key1").is_none());
    }

    #[test]
    fn test_store_lru_eviction() {
        let store = BoundedStore::new(3).unwrap();

        store.put("key1".to_string(), entry("value1"));
        store.put("key2".to_string(), entry("value2"));
        store.put("key3".to_string(), entry("value3"));

        // Cache is full, adding key4 should evict key1 (oldest)
        let evicted = store.put("key4".to_string(), entry("value4"));

        assert_eq!(evicted, Some("key1".to_string()));
        assert_eq!(store.len(), 3);
        assert_eq!(store.evictions(), 1);
        assert!(value_of(&store, "key1").is_none());
        assert!(value_of(&store, "key2").is_some());
        assert!(value_of(&store, "key3").is_some());
        assert!(value_of(&store, "key4").is_some());
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let store = BoundedStore::new(2).unwrap();

        store.put("A".to_string(), entry("a"));
        store.put("B".to_string(), entry("b"));
        value_of(&store, "A");
        store.put("C".to_string(), entry("c"));

        assert!(store.contains(&"A".to_string()));
        assert!(store.contains(&"C".to_string()));
        assert!(!store.contains(&"B".to_string()));
    }

    #[test]
    fn test_store_overwrite_refreshes_recency() {
        let store = BoundedStore::new(2).unwrap();

        store.put("A".to_string(), entry("a"));
        store.put("B".to_string(), entry("b"));
        store.put("A".to_string(), entry("a2"));
        let evicted = store.put("C".to_string(), entry("c"));

        assert_eq!(evicted, Some("B".to_string()));
    }

    #[test]
    fn test_peek_and_contains_do_not_touch() {
        let store = BoundedStore::new(2).unwrap();

        store.put("A".to_string(), entry("a"));
        store.put("B".to_string(), entry("b"));
        assert!(store.peek(&"A".to_string()).is_some());
        assert!(store.contains(&"A".to_string()));

        let evicted = store.put("C".to_string(), entry("c"));
        assert_eq!(evicted, Some("A".to_string()));
    }

    #[test]
    fn test_replace_keeps_recency_and_skips_absent_keys() {
        let store = BoundedStore::new(2).unwrap();

        store.put("A".to_string(), entry("a"));
        store.put("B".to_string(), entry("b"));

        assert!(store.replace(&"A".to_string(), entry("a2")));
        assert!(!store.replace(&"Z".to_string(), entry("z")));
        assert!(!store.contains(&"Z".to_string()));

        // A was replaced but not touched, so it is still the LRU victim
        let evicted = store.put("C".to_string(), entry("c"));
        assert_eq!(evicted, Some("A".to_string()));
    }

    #[test]
    fn test_remove_if() {
        let store = BoundedStore::new(10).unwrap();
        for i in 0..6 {
            store.put(format!("key{}", i), entry(&i.to_string()));
        }

        let removed = store.remove_if(|_, e| e.value().parse::<u32>().unwrap() % 2 == 0);

        assert_eq!(removed, 3);
        assert_eq!(store.len(), 3);
        assert!(store.contains(&"key1".to_string()));
        assert!(!store.contains(&"key2".to_string()));

        // Removed keys must no longer take part in eviction order
        for i in 10..17 {
            store.put(format!("key{}", i), entry("x"));
        }
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_keys_snapshot() {
        let store = BoundedStore::new(10).unwrap();
        store.put("key1".to_string(), entry("v"));
        store.put("key2".to_string(), entry("v"));

        let keys = store.keys();
        store.remove(&"key1".to_string());
        store.put("key3".to_string(), entry("v"));

        let mut keys = keys;
        keys.sort();
        assert_eq!(keys, vec!["key1".to_string(), "key2".to_string()]);
    }

    #[test]
    fn test_concurrent_puts_respect_capacity() {
        let store = Arc::new(BoundedStore::new(8).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..200 {
                        store.put(format!("{}-{}", t, i), entry("v"));
                        assert!(store.len() <= 8);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        assert_eq!(store.evictions(), 8 * 200 - 8);
    }
}
