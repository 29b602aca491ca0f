//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with access tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

// == Cache Entry ==
/// A cached value with its creation time and last-access time.
///
/// The value and creation time never change. The last-access time is an
/// atomic updated independently of the rest of the entry and never moves
/// below the creation time.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value
    value: V,
    /// Creation timestamp (Unix milliseconds)
    created_at: u64,
    /// Last access timestamp (Unix milliseconds)
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(value: V) -> Self {
        Self::with_timestamp(value, current_timestamp_ms())
    }

    /// Creates an entry with an explicit creation time.
    pub fn with_timestamp(value: V, created_at: u64) -> Self {
        Self {
            value,
            created_at,
            last_access: AtomicU64::new(created_at),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    // == Touch ==
    /// Moves the last-access time forward to now.
    pub fn touch(&self) {
        self.touch_at(current_timestamp_ms());
    }

    /// Moves the last-access time forward to `now`; earlier values are ignored.
    pub fn touch_at(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::AcqRel);
    }

    // == Ages ==
    /// Milliseconds elapsed since creation.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    /// Milliseconds elapsed since the last recorded access.
    pub fn idle_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_access())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string());

        assert_eq!(entry.value(), "test_value");
        assert_eq!(entry.created_at(), entry.last_access());
    }

    #[test]
    fn test_touch_moves_last_access_forward() {
        let entry = CacheEntry::new(1);
        let created = entry.created_at();

        sleep(Duration::from_millis(20));
        entry.touch();

        assert!(entry.last_access() > created);
        assert_eq!(entry.created_at(), created);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let entry = CacheEntry::with_timestamp("v", 1_000);

        entry.touch_at(5_000);
        entry.touch_at(2_000);
        entry.touch_at(500);

        assert_eq!(entry.last_access(), 5_000);
        assert!(entry.created_at() <= entry.last_access());
    }

    #[test]
    fn test_age_and_idle() {
        let entry = CacheEntry::with_timestamp("v", 1_000);
        entry.touch_at(1_500);

        assert_eq!(entry.age_ms(2_000), 1_000);
        assert_eq!(entry.idle_ms(2_000), 500);
        // Clock skew saturates rather than underflowing
        assert_eq!(entry.age_ms(0), 0);
    }

    #[test]
    fn test_concurrent_touches() {
        let entry = Arc::new(CacheEntry::with_timestamp("v", 0));

        let handles: Vec<_> = (1..=8u64)
            .map(|i| {
                let entry = Arc::clone(&entry);
                thread::spawn(move || {
                    for step in 0..100 {
                        entry.touch_at(i * 1_000 + step);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(entry.last_access(), 8_099);
    }
}
