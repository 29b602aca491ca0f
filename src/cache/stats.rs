//! Cache Statistics Module
//!
//! Tracks cache activity: hits, misses, evictions, expirations, refreshes and
//! backing-store loads.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads served from the cache
    pub hits: u64,
    /// Reads that fell through to the backing store
    pub misses: u64,
    /// Entries removed because the store was at capacity
    pub evictions: u64,
    /// Entries removed by the expiration sweep
    pub expirations: u64,
    /// Entries overwritten by the refresh sweep
    pub refreshes: u64,
    /// Values installed from the backing store (read-through and initial load)
    pub loads: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by foreground calls and background sweeps.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    refreshes: AtomicU64,
    loads: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Builds a snapshot; eviction and occupancy figures come from the store.
    pub fn snapshot(&self, evictions: u64, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions,
            expirations: self.expirations.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let recorder = StatsRecorder::new();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();

        let stats = recorder.snapshot(0, 0);
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_snapshot_carries_store_figures() {
        let recorder = StatsRecorder::new();
        recorder.record_expirations(3);
        recorder.record_refresh();
        recorder.record_load();

        let stats = recorder.snapshot(7, 42);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.evictions, 7);
        assert_eq!(stats.total_entries, 42);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = StatsRecorder::new().snapshot(1, 2);
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["evictions"], 1);
        assert_eq!(json["total_entries"], 2);
    }
}
