//! Generic concurrent cache substrate (spec.md §4.1).
//!
//! `ConcurrentCache<K, V>` is the keyed store every domain cache in this
//! crate layers on top of: TTL expiry, an LRU eviction cap, at-most-one
//! async materialization per key (`get_or_add_async`), and hit/miss/eviction
//! statistics. Modeled on the teacher's `parking_lot`-guarded state structs
//! (`src/scrapers/binance_session.rs::SessionManager`,
//! `src/middleware/rate_limit.rs::RateLimitLayer`) with the single-flight
//! join adapted from the wait-list pattern in
//! `examples/other_examples/.../polkadot-evm-frontier.../eth-cache-mod.rs.rs`.

mod entry;
mod stats;

pub use entry::CacheEntry;
pub use stats::{CacheStats, CacheStatsInner};

use crate::config::{CacheConfig, Priority, SetOptions};
use crate::error::{CacheError, CacheResult};
use futures::future::{FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Grace period a failed `get_or_add_async` factory's pending entry is kept
/// around for, so concurrent joiners observe the same failure before a
/// fresh attempt is allowed (spec.md §4.1, §7 "Factory failure").
const FAILED_FACTORY_GRACE: Duration = Duration::from_millis(50);

type PendingFuture<V> = Pin<Box<dyn Future<Output = CacheResult<V>> + Send>>;

pub struct ConcurrentCache<K, V> {
    config: CacheConfig,
    store: RwLock<HashMap<K, CacheEntry<V>>>,
    pending: Arc<Mutex<HashMap<K, Shared<PendingFuture<V>>>>>,
    stats: CacheStatsInner,
    disposed: AtomicBool,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> ConcurrentCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Constructs a new cache. If `config.cleanup_interval_ms > 0` and a
    /// Tokio runtime is currently entered, spawns the periodic
    /// `remove_expired` sweep; otherwise the sweep is simply not scheduled
    /// (manual `remove_expired` calls still work) and a warning is logged.
    pub fn new(config: CacheConfig) -> Arc<Self> {
        let cache = Arc::new(Self {
            store: RwLock::new(HashMap::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
            stats: CacheStatsInner::default(),
            disposed: AtomicBool::new(false),
            cleanup_task: Mutex::new(None),
            config: config.clone(),
        });

        if let Some(interval) = config.cleanup_interval() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let weak: Weak<Self> = Arc::downgrade(&cache);
                let task = handle.spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.tick().await; // first tick fires immediately; skip it
                    loop {
                        ticker.tick().await;
                        match weak.upgrade() {
                            Some(cache) => {
                                cache.remove_expired();
                            }
                            None => break,
                        }
                    }
                });
                *cache.cleanup_task.lock() = Some(task);
            } else {
                tracing::warn!(
                    name = %config.name,
                    "no tokio runtime entered; periodic cache cleanup disabled"
                );
            }
        }

        cache
    }

    fn resolved_ttl(&self, options: &SetOptions) -> i64 {
        options.ttl_ms.unwrap_or(self.config.default_ttl_ms)
    }

    fn resolved_priority(&self, options: &SetOptions) -> Priority {
        options.priority.unwrap_or_default()
    }

    /// Returns the value and bumps `last_accessed_at`; removes and counts an
    /// expiration if the entry has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut store = self.store.write();
        match store.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                store.remove(key);
                drop(store);
                self.stats.record_expiration();
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                entry.touch();
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    pub fn set(&self, key: K, value: V, options: SetOptions) {
        let ttl = self.resolved_ttl(&options);
        let priority = self.resolved_priority(&options);
        {
            let mut store = self.store.write();
            store.insert(key, CacheEntry::new(value, ttl, priority));
        }
        self.enforce_eviction();
    }

    /// Atomic single-value materialization (spec.md §4.1 `getOrAdd`).
    /// Factory panics propagate to the caller uncached, per §4.1 failure
    /// semantics — there is no catching mechanism in Rust to "cache" a panic.
    ///
    /// Acquiring through a disposed cache is the "resource acquisition"
    /// case spec.md §7 calls out (`CacheError::Disposed`), distinct from
    /// the silent-rejection policy that governs plain `set`/`remove`.
    pub fn get_or_add<F>(&self, key: K, factory: F, options: SetOptions) -> CacheResult<V>
    where
        F: FnOnce() -> V,
    {
        self.ensure_not_disposed()?;
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }
        let value = factory();
        self.set(key, value.clone(), options);
        Ok(value)
    }

    /// At-most-one in-flight materialization per key (spec.md §4.1
    /// `getOrAddAsync`). Concurrent callers for the same uncached key share
    /// one factory invocation via `futures::future::Shared`.
    pub async fn get_or_add_async<F, Fut>(
        &self,
        key: K,
        factory: F,
        options: SetOptions,
    ) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<V>> + Send + 'static,
    {
        self.ensure_not_disposed()?;
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }

        let (shared, is_owner) = {
            let mut pending = self.pending.lock();
            if let Some(existing) = pending.get(&key) {
                (existing.clone(), false)
            } else {
                let fut: PendingFuture<V> = Box::pin(factory());
                let shared = fut.shared();
                pending.insert(key.clone(), shared.clone());
                (shared, true)
            }
        };

        let result = shared.await;

        if is_owner {
            match &result {
                Ok(value) => {
                    self.set(key.clone(), value.clone(), options);
                    self.pending.lock().remove(&key);
                }
                Err(_) => {
                    let pending = self.pending.clone();
                    let key_for_cleanup = key.clone();
                    if tokio::runtime::Handle::try_current().is_ok() {
                        tokio::spawn(async move {
                            tokio::time::sleep(FAILED_FACTORY_GRACE).await;
                            pending.lock().remove(&key_for_cleanup);
                        });
                    } else {
                        // No runtime to host the grace-period task: clear
                        // immediately so retries are never permanently stuck.
                        pending.lock().remove(&key_for_cleanup);
                    }
                }
            }
        }

        result
    }

    /// spec.md §4.1 `addOrUpdate`: applies `update` to the existing value
    /// when present (and unexpired), else calls `add`. Both paths replace
    /// the entry atomically under the store's write lock. Disposed-cache
    /// semantics match `get_or_add`.
    pub fn add_or_update<A, U>(&self, key: K, add: A, update: U, options: SetOptions) -> CacheResult<V>
    where
        A: FnOnce() -> V,
        U: FnOnce(&V) -> V,
    {
        self.ensure_not_disposed()?;
        let ttl = self.resolved_ttl(&options);
        let priority = self.resolved_priority(&options);
        let new_value = {
            let mut store = self.store.write();
            let existing = store
                .get(&key)
                .filter(|e| !e.is_expired())
                .map(|e| e.value.clone());
            let value = match existing {
                Some(v) => update(&v),
                None => add(),
            };
            store.insert(key, CacheEntry::new(value.clone(), ttl, priority));
            value
        };
        self.enforce_eviction();
        Ok(new_value)
    }

    pub fn remove(&self, key: &K) -> bool {
        self.store.write().remove(key).is_some()
    }

    pub fn has(&self, key: &K) -> bool {
        let mut store = self.store.write();
        match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.remove(key);
                drop(store);
                self.stats.record_expiration();
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn clear(&self) {
        self.store.write().clear();
    }

    pub fn keys(&self) -> Vec<K> {
        self.store
            .read()
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Returns all unexpired values *without* touching access time
    /// (spec.md §4.1).
    pub fn get_all(&self) -> Vec<V> {
        self.store
            .read()
            .values()
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone())
            .collect()
    }

    pub fn filter(&self, mut predicate: impl FnMut(&K, &V) -> bool) -> Vec<(K, V)> {
        self.store
            .read()
            .iter()
            .filter(|(_, e)| !e.is_expired())
            .filter(|(k, e)| predicate(k, &e.value))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for (k, e) in self.store.read().iter() {
            if !e.is_expired() {
                f(k, &e.value);
            }
        }
    }

    /// Sweeps expired entries; returns the number removed.
    pub fn remove_expired(&self) -> usize {
        let mut store = self.store.write();
        let expired: Vec<K> = store
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            store.remove(k);
        }
        let count = expired.len();
        drop(store);
        if count > 0 {
            self.stats.expirations.fetch_add(count as u64, Ordering::Relaxed);
        }
        count
    }

    pub fn set_ttl(&self, key: &K, ttl_ms: i64) -> bool {
        match self.store.write().get_mut(key) {
            Some(entry) => {
                entry.ttl_ms = ttl_ms;
                true
            }
            None => false,
        }
    }

    pub fn touch(&self, key: &K) -> bool {
        match self.store.write().get_mut(key) {
            Some(entry) => {
                entry.touch();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_stats(&self) -> CacheStats {
        self.stats.snapshot(self.len(), self.config.max_entries, &self.config.name)
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_not_disposed(&self) -> CacheResult<()> {
        if self.is_disposed() {
            Err(CacheError::Disposed(self.config.name.clone().into()))
        } else {
            Ok(())
        }
    }

    /// Idempotent: cancels the cleanup timer, drops all entries and pending
    /// materializations, and may be called any number of times without error
    /// (spec.md §8 testable property 8).
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.cleanup_task.lock().take() {
            handle.abort();
        }
        self.store.write().clear();
        self.pending.lock().clear();
    }

    /// Eviction policy (spec.md §4.1 "Eviction policy"): when `size >
    /// max_entries`, drop the oldest-by-`last_accessed_at` non-`NeverRemove`
    /// entries until under cap. If every entry is `NeverRemove`, the cap may
    /// be exceeded — by design, documented here and in spec.md.
    fn enforce_eviction(&self) {
        if self.config.max_entries < 0 {
            return;
        }
        let max = self.config.max_entries as usize;
        let mut store = self.store.write();
        if store.len() <= max {
            return;
        }
        let overflow = store.len() - max;
        let mut candidates: Vec<(K, Instant)> = store
            .iter()
            .filter(|(_, e)| e.priority != Priority::NeverRemove)
            .map(|(k, e)| (k.clone(), e.last_accessed_at))
            .collect();
        candidates.sort_by_key(|(_, accessed)| *accessed);
        let mut removed = 0u64;
        for (key, _) in candidates.into_iter().take(overflow) {
            store.remove(&key);
            removed += 1;
        }
        drop(store);
        if removed > 0 {
            self.stats.record_eviction_n(removed);
        }
    }
}

impl<K, V> Drop for ConcurrentCache<K, V> {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::SeqCst) {
            if let Some(handle) = self.cleanup_task.lock().take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max_entries: i64) -> CacheConfig {
        CacheConfig {
            default_ttl_ms: -1,
            max_entries,
            cleanup_interval_ms: 0,
            track_stats: true,
            name: "test".to_string(),
        }
    }

    // S1 — LRU eviction.
    #[test]
    fn lru_eviction_drops_least_recently_accessed() {
        let cache: Arc<ConcurrentCache<&'static str, i32>> = ConcurrentCache::new(cfg(2));
        cache.set("a", 1, SetOptions::default());
        cache.set("b", 2, SetOptions::default());
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("c", 3, SetOptions::default());

        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(cache.get_stats().evictions, 1);
    }

    #[test]
    fn never_remove_entries_survive_eviction_and_cap_may_be_exceeded() {
        let cache: Arc<ConcurrentCache<&'static str, i32>> = ConcurrentCache::new(cfg(1));
        cache.set(
            "a",
            1,
            SetOptions {
                priority: Some(Priority::NeverRemove),
                ..Default::default()
            },
        );
        cache.set(
            "b",
            2,
            SetOptions {
                priority: Some(Priority::NeverRemove),
                ..Default::default()
            },
        );
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_entries_are_treated_as_missing() {
        let cache: Arc<ConcurrentCache<&'static str, i32>> = ConcurrentCache::new(CacheConfig {
            default_ttl_ms: 1,
            ..cfg(-1)
        });
        cache.set("a", 1, SetOptions::default());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get_stats().expirations, 1);
    }

    #[test]
    fn hit_ratio_identity() {
        let cache: Arc<ConcurrentCache<&'static str, i32>> = ConcurrentCache::new(cfg(-1));
        cache.set("a", 1, SetOptions::default());
        cache.get(&"a");
        cache.get(&"a");
        cache.get(&"missing");
        let stats = cache.get_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn dispose_is_idempotent() {
        let cache: Arc<ConcurrentCache<&'static str, i32>> = ConcurrentCache::new(cfg(-1));
        cache.set("a", 1, SetOptions::default());
        cache.dispose();
        cache.dispose();
        assert!(cache.is_empty());
    }

    // S2 — async single-flight.
    #[tokio::test]
    async fn get_or_add_async_invokes_factory_once_for_concurrent_callers() {
        let cache: Arc<ConcurrentCache<&'static str, i32>> = ConcurrentCache::new(cfg(-1));
        let calls = Arc::new(AtomicU64Counter::default());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_add_async(
                        "k",
                        move || {
                            let calls = calls.clone();
                            async move {
                                calls.incr();
                                tokio::time::sleep(Duration::from_millis(50)).await;
                                Ok(42)
                            }
                        },
                        SetOptions::default(),
                    )
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn get_or_add_async_propagates_factory_failure_to_all_waiters() {
        let cache: Arc<ConcurrentCache<&'static str, i32>> = ConcurrentCache::new(cfg(-1));
        let r1 = cache
            .get_or_add_async(
                "k",
                || async { Err(CacheError::FactoryFailed("boom".into())) },
                SetOptions::default(),
            )
            .await;
        assert!(r1.is_err());
    }

    #[derive(Default)]
    struct AtomicU64Counter(std::sync::atomic::AtomicU64);
    impl AtomicU64Counter {
        fn incr(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn get(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }
}
