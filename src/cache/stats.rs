//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and expirations.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to satisfy the capacity bound
    pub evictions: u64,
    /// Number of entries removed because their TTL or TTI elapsed
    pub expirations: u64,
    /// Current number of entries in the cache
    pub size: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
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
/// Lock-free counters shared by all threads using a cache.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl StatsRecorder {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self, size: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StatsRecorder::default().snapshot(0);
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let recorder = StatsRecorder::default();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();
        assert_eq!(recorder.snapshot(3).hit_rate(), 0.75);
    }

    #[test]
    fn test_record_evictions_and_expirations() {
        let recorder = StatsRecorder::default();
        recorder.record_eviction();
        recorder.record_eviction();
        recorder.record_expirations(3);

        let stats = recorder.snapshot(42);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expirations, 3);
        assert_eq!(stats.size, 42);
    }

    #[test]
    fn test_stats_serialize() {
        let recorder = StatsRecorder::default();
        recorder.record_hit();
        let json = serde_json::to_value(recorder.snapshot(1)).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["size"], 1);
    }
}
