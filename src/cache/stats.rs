//! Cache Statistics Module
//!
//! Tracks lookup outcomes and maintenance work across all shards.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// A point-in-time snapshot of cache metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of lookups that found a live entry
    pub hits: u64,
    /// Number of lookups that found nothing (absent or expired)
    pub misses: u64,
    /// Number of non-blocking lookups that gave up on a held lock
    pub contended: u64,
    /// Number of expired entries reclaimed by the cleaner
    pub evictions: u64,
    /// Number of shard resizes performed by the expander
    pub expansions: u64,
    /// Number of shards
    pub shards: usize,
    /// Total bucket count across shards
    pub buckets: usize,
    /// Approximate number of stored entries
    pub entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses + contended), or 0.0 if no lookups
    /// have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.contended;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Counters ==
/// Lock-free counters shared by all callers and maintenance tasks.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    contended: AtomicU64,
    evictions: AtomicU64,
    expansions: AtomicU64,
}

impl Counters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_contended(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_expansion(&self) {
        self.expansions.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters into a snapshot; table sizes are left at zero.
    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expansions: self.expansions.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let counters = Counters::default();
        counters.record_hit();
        counters.record_miss();
        counters.record_contended();
        counters.record_hit();

        let stats = counters.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_maintenance_counters() {
        let counters = Counters::default();
        counters.record_evictions(3);
        counters.record_evictions(0);
        counters.record_expansion();

        let stats = counters.snapshot();
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.expansions, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_stats_serialize() {
        let stats = CacheStats {
            hits: 1,
            shards: 2,
            ..CacheStats::default()
        };
        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["hits"], 1);
        assert_eq!(json["shards"], 2);
        assert_eq!(json["evictions"], 0);
    }
}
