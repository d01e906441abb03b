//! Per-entry envelope (spec.md §3 `CacheEntry<V>`).

use crate::config::{Priority, NEVER_EXPIRE};
use std::time::{Duration, Instant};

/// A stored value plus the bookkeeping the substrate needs for TTL
/// expiry, LRU eviction, and access statistics.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    /// Milliseconds; `NEVER_EXPIRE` (-1) means the entry never expires.
    pub ttl_ms: i64,
    pub priority: Priority,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl_ms: i64, priority: Priority) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl_ms,
            priority,
        }
    }

    /// `isExpired ⇔ ttlMs ≠ −1 ∧ now − createdAt > ttlMs` (spec.md §3).
    pub fn is_expired(&self) -> bool {
        if self.ttl_ms == NEVER_EXPIRE {
            return false;
        }
        self.created_at.elapsed() > Duration::from_millis(self.ttl_ms.max(0) as u64)
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Instant::now();
        self.access_count += 1;
    }
}
