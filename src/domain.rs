//! Domain cache base (spec.md §4.2).
//!
//! Every domain cache (account, position, order, symbol-info, rate-limit)
//! owns exactly one [`ConcurrentCache`] and forwards a narrow surface to it,
//! the way the teacher's `src/edge/mod.rs` re-exports a curated surface over
//! `receiver`/`client`/`wire` rather than letting callers reach into the
//! internals directly.

use crate::substrate::{CacheStats, ConcurrentCache};
use std::hash::Hash;
use std::sync::Arc;

/// Shared behavior every domain cache exposes over its private substrate.
pub trait DomainCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn substrate(&self) -> &Arc<ConcurrentCache<K, V>>;

    fn size(&self) -> usize {
        self.substrate().len()
    }

    fn is_empty(&self) -> bool {
        self.substrate().is_empty()
    }

    fn get_stats(&self) -> CacheStats {
        self.substrate().get_stats()
    }

    fn reset_stats(&self) {
        self.substrate().reset_stats()
    }

    fn clear(&self) {
        self.substrate().clear()
    }

    fn dispose(&self) {
        self.substrate().dispose()
    }
}
