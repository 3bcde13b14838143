//! Cache Statistics Module
//!
//! Tracks cache performance counters (hits, misses, evictions) and packages
//! them with the descriptive store-derived figures into a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Live counters, shared across concurrent cache operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Evictions ==
    /// Adds evicted collection count to the eviction counter.
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Freezes the counters together with store-derived figures.
    pub fn snapshot(
        &self,
        resident_count: usize,
        approximate_size_bytes: usize,
    ) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            resident_count,
            approximate_size_bytes,
        }
    }
}

// == Stats Snapshot ==
/// Point-in-time cache statistics. Descriptive only; the size figure carries
/// no correctness guarantee.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    /// Number of complete cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (absent, expired, or partial)
    pub misses: u64,
    /// Number of collections evicted to meet the resident budget
    pub evictions: u64,
    /// Distinct owners with a collection record resident
    pub resident_count: usize,
    /// Sum of stored value lengths under the cache namespace
    pub approximate_size_bytes: usize,
}

impl CacheStatsSnapshot {
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
