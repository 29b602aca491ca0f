//! LRU Tracker Module
//!
//! Implements least recently used ordering for cache eviction.

use std::collections::BTreeMap;

// == Recency List ==
/// Tracks access order for LRU eviction.
///
/// Every touch hands out a new, strictly increasing stamp. Keys are indexed by
/// their latest stamp, so the smallest stamp is always the least recently used
/// key and keys that were never touched again after insertion leave in
/// insertion order.
///
/// The caller keeps each key's current stamp alongside its entry and passes it
/// back on the next touch or removal.
#[derive(Debug)]
pub struct RecencyList<K> {
    /// Stamp -> key, oldest first
    order: BTreeMap<u64, K>,
    /// Next stamp to hand out
    next_stamp: u64,
}

impl<K> Default for RecencyList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RecencyList<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            next_stamp: 0,
        }
    }

    // == Touch ==
    /// Marks a key as most recently used and returns its new stamp.
    ///
    /// `previous` is the stamp returned by the last touch of this key, or
    /// `None` for a key that is not tracked yet.
    pub fn touch(&mut self, previous: Option<u64>, key: K) -> u64 {
        if let Some(stamp) = previous {
            self.order.remove(&stamp);
        }
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.order.insert(stamp, key);
        stamp
    }

    // == Remove ==
    /// Stops tracking the key holding `stamp`.
    pub fn remove(&mut self, stamp: u64) -> Option<K> {
        self.order.remove(&stamp)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_first().map(|(_, key)| key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru: RecencyList<&str> = RecencyList::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_touch_new_keys_orders_by_insertion() {
        let mut lru = RecencyList::new();

        lru.touch(None, "key1");
        lru.touch(None, "key2");
        lru.touch(None, "key3");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.evict_oldest(), Some("key1"));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_touch_existing_key_moves_it_to_newest() {
        let mut lru = RecencyList::new();

        let s1 = lru.touch(None, "key1");
        lru.touch(None, "key2");
        lru.touch(None, "key3");

        lru.touch(Some(s1), "key1");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.evict_oldest(), Some("key2"));
        assert_eq!(lru.evict_oldest(), Some("key3"));
        assert_eq!(lru.evict_oldest(), Some("key1"));
    }

    #[test]
    fn test_evict_empty() {
        let mut lru: RecencyList<String> = RecencyList::new();
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_remove() {
        let mut lru = RecencyList::new();

        lru.touch(None, "key1");
        let s2 = lru.touch(None, "key2");
        lru.touch(None, "key3");

        assert_eq!(lru.remove(s2), Some("key2"));
        assert_eq!(lru.remove(s2), None);

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evict_oldest(), Some("key1"));
        assert_eq!(lru.evict_oldest(), Some("key3"));
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let mut lru = RecencyList::new();

        let a = lru.touch(None, 'a');
        let b = lru.touch(None, 'b');
        let a2 = lru.touch(Some(a), 'a');

        assert!(a < b);
        assert!(b < a2);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_order_after_multiple_touches() {
        let mut lru = RecencyList::new();

        let a = lru.touch(None, "a");
        let b = lru.touch(None, "b");
        let c = lru.touch(None, "c");

        lru.touch(Some(a), "a");
        lru.touch(Some(c), "c");
        lru.touch(Some(b), "b");

        assert_eq!(lru.evict_oldest(), Some("a"));
        assert_eq!(lru.evict_oldest(), Some("c"));
        assert_eq!(lru.evict_oldest(), Some("b"));
    }
}
