//! Configuration structs recognized by the core (spec.md §6).
//!
//! No environment or file loading lives here — per spec.md §6 the core has
//! "no files, wire formats, or CLI surface"; the owning process constructs
//! these programmatically (contrast with `src/models.rs::Config::from_env`
//! in the teacher, which belongs to the excluded host process).

use std::time::Duration;

/// Eviction priority for a cache entry (spec.md §3 `CacheEntry<V>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    /// Ineligible for LRU eviction, but still eligible for explicit removal
    /// and TTL expiry (spec.md §3).
    NeverRemove,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Sentinel meaning "never expire" for TTL fields.
pub const NEVER_EXPIRE: i64 = -1;

/// Sentinel meaning "unlimited" for `max_entries`.
pub const UNLIMITED: i64 = -1;

/// Configuration for one [`crate::substrate::ConcurrentCache`] (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL in milliseconds; `NEVER_EXPIRE` (-1) disables expiry.
    pub default_ttl_ms: i64,
    /// Maximum number of entries before LRU eviction kicks in; `UNLIMITED` (-1) disables the cap.
    pub max_entries: i64,
    /// Interval between background `remove_expired` sweeps; `<= 0` disables the timer.
    pub cleanup_interval_ms: i64,
    /// Whether hit/miss/eviction counters are tracked.
    pub track_stats: bool,
    /// Debug label surfaced in `CacheStats::name`.
    pub name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 300_000,
            max_entries: 1_000,
            cleanup_interval_ms: 60_000,
            track_stats: true,
            name: "cache".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        if self.cleanup_interval_ms > 0 {
            Some(Duration::from_millis(self.cleanup_interval_ms as u64))
        } else {
            None
        }
    }
}

/// Per-`set` override of TTL/priority (spec.md §4.1 `set(key, value, options)`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub ttl_ms: Option<i64>,
    pub priority: Option<Priority>,
}

/// Account cache configuration (spec.md §6).
#[derive(Debug, Clone)]
pub struct AccountCacheConfig {
    pub cache: CacheConfig,
    /// Auto-refresh interval; default 5 000 ms.
    pub refresh_interval_ms: u64,
}

impl Default for AccountCacheConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::named("account"),
            refresh_interval_ms: 5_000,
        }
    }
}

/// Order cache configuration (spec.md §6).
#[derive(Debug, Clone)]
pub struct OrderCacheConfig {
    pub cache: CacheConfig,
    /// Soft cap on tracked orders per instance; default 1 000.
    pub max_orders_per_instance: usize,
}

impl Default for OrderCacheConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::named("orders"),
            max_orders_per_instance: 1_000,
        }
    }
}
