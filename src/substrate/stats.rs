//! Cache statistics (spec.md §4.1 "Stats").
//!
//! Atomic counters in the style of the teacher's `SessionMetrics`
//! (`src/scrapers/binance_session.rs`) and `EdgeReceiverStats`
//! (`src/edge/receiver.rs`): plain `AtomicU64` fields with a `snapshot()`
//! method producing a plain-data struct for callers.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheStatsInner {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub expirations: AtomicU64,
}

impl CacheStatsInner {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction_n(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self, size: usize, max_entries: i64, name: &str) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            size,
            max_entries,
            hits,
            misses,
            hit_ratio: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            name: name.to_string(),
        }
    }
}

/// Point-in-time snapshot returned by `ConcurrentCache::get_stats` (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_entries: i64,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, `0.0` when both are zero.
    pub hit_ratio: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub name: String,
}
