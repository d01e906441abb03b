//! Account cache (spec.md §4.3).
//!
//! Grounded on `src/vault/user_accounts.rs`'s balance-field shape (without
//! its SQLite persistence) and the teacher's `parking_lot`-guarded timer
//! bookkeeping in `src/scrapers/binance_session.rs::SessionManager`
//! (per-key state plus an owned background task, stopped explicitly).

use super::types::{AccountBalance, AccountCacheEntry};
use crate::config::{AccountCacheConfig, CacheConfig, SetOptions, NEVER_EXPIRE};
use crate::domain::DomainCache;
use crate::instance::InstanceKey;
use crate::result::ReadResult;
use crate::substrate::ConcurrentCache;
use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Caller-supplied async refresh routine (typically: call REST, then feed
/// the result into [`crate::account::AccountCacheUpdater::refresh_from_snapshot`]).
/// Owned entirely by the host process — the core makes no REST assumptions.
pub type RefreshCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

struct AutoRefreshHandle {
    callback: RefreshCallback,
    task: JoinHandle<()>,
}

pub struct AccountCache {
    entries: Arc<ConcurrentCache<InstanceKey, AccountCacheEntry>>,
    refresh_interval_ms: RwLock<u64>,
    auto_refresh: Mutex<HashMap<InstanceKey, AutoRefreshHandle>>,
}

impl AccountCache {
    pub fn new(config: AccountCacheConfig) -> Arc<Self> {
        let entries = ConcurrentCache::new(CacheConfig {
            default_ttl_ms: NEVER_EXPIRE,
            ..config.cache
        });
        Arc::new(Self {
            entries,
            refresh_interval_ms: RwLock::new(config.refresh_interval_ms),
            auto_refresh: Mutex::new(HashMap::new()),
        })
    }

    /// spec.md §4.3 `update`. Rejects the update (returns `false`, logs a
    /// warning) when an existing entry's `transaction_time` is greater than
    /// or equal to the incoming one.
    ///
    /// Open question (spec.md §9): this stales-check keys off
    /// `transaction_time`, which the reference sources from
    /// `accountBalance.lastUpdate`. If the remote resets that field the
    /// update will be spuriously rejected — the core does not attempt to
    /// detect non-monotonicity and fall back to wall-clock, per spec.
    pub fn update(
        &self,
        instance: &InstanceKey,
        mut balance: AccountBalance,
        transaction_time: Option<i64>,
    ) -> bool {
        balance.recompute_totals();
        let existing = self.entries.get(instance);

        if let (Some(existing), Some(incoming_tt)) = (&existing, transaction_time) {
            if let Some(existing_tt) = existing.transaction_time {
                if existing_tt >= incoming_tt {
                    tracing::warn!(
                        instance = %instance,
                        existing_tt,
                        incoming_tt,
                        "rejecting stale account balance update"
                    );
                    return false;
                }
            }
        }

        let now = Utc::now();
        let interval_ms = *self.refresh_interval_ms.read();
        let entry = AccountCacheEntry {
            balance,
            last_fetch: now,
            next_refresh: now + chrono::Duration::milliseconds(interval_ms as i64),
            fetch_count: existing.as_ref().map(|e| e.fetch_count + 1).unwrap_or(1),
            errors: 0,
            transaction_time,
        };
        self.entries.set(instance.clone(), entry, SetOptions::default());
        true
    }

    /// spec.md §4.3 `recordError`.
    pub fn record_error(&self, instance: &InstanceKey) {
        if let Some(mut entry) = self.entries.get(instance) {
            entry.errors += 1;
            let interval_ms = *self.refresh_interval_ms.read();
            entry.next_refresh = Utc::now() + chrono::Duration::milliseconds(interval_ms as i64);
            self.entries.set(instance.clone(), entry, SetOptions::default());
        }
    }

    /// spec.md §4.3 `getBalance`: lock-free read returning the uniform
    /// envelope, with `stale_ms` populated from `last_fetch`.
    pub fn get_balance(&self, instance: &InstanceKey) -> ReadResult<AccountBalance> {
        let start = Instant::now();
        match self.entries.get(instance) {
            Some(entry) => {
                let stale_ms = (Utc::now() - entry.last_fetch).num_milliseconds();
                ReadResult::ok_with_staleness(
                    entry.balance,
                    start.elapsed().as_secs_f64() * 1000.0,
                    stale_ms,
                )
            }
            None => ReadResult::missing(
                "Account balance not yet fetched",
                start.elapsed().as_secs_f64() * 1000.0,
            ),
        }
    }

    pub fn fetch_count(&self, instance: &InstanceKey) -> Option<u64> {
        self.entries.get(instance).map(|e| e.fetch_count)
    }

    pub fn error_count(&self, instance: &InstanceKey) -> Option<u32> {
        self.entries.get(instance).map(|e| e.errors)
    }

    /// spec.md §4.3 `startAutoRefresh`: installs a periodic timer at the
    /// configured interval that awaits `callback`; callback failures call
    /// `record_error` but do not stop the timer.
    pub fn start_auto_refresh(self: &Arc<Self>, instance: InstanceKey, callback: RefreshCallback) {
        self.stop_auto_refresh(&instance);
        self.spawn_refresh_task(instance, callback);
    }

    fn spawn_refresh_task(self: &Arc<Self>, instance: InstanceKey, callback: RefreshCallback) {
        let interval_ms = (*self.refresh_interval_ms.read()).max(1);
        let this = self.clone();
        let cb = callback.clone();
        let inst = instance.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                if let Err(error) = (cb)().await {
                    tracing::warn!(instance = %inst, %error, "account auto-refresh callback failed");
                    this.record_error(&inst);
                }
            }
        });
        self.auto_refresh.lock().insert(instance, AutoRefreshHandle { callback, task });
    }

    /// spec.md §4.3 `stopAutoRefresh`.
    pub fn stop_auto_refresh(&self, instance: &InstanceKey) {
        if let Some(handle) = self.auto_refresh.lock().remove(instance) {
            handle.task.abort();
        }
    }

    /// spec.md §4.3 `setRefreshInterval`: updates the interval for all
    /// future schedules and reschedules every currently active timer.
    pub fn set_refresh_interval(self: &Arc<Self>, interval_ms: u64) {
        *self.refresh_interval_ms.write() = interval_ms;
        let active: Vec<(InstanceKey, RefreshCallback)> = {
            let mut guard = self.auto_refresh.lock();
            let keys: Vec<InstanceKey> = guard.keys().cloned().collect();
            keys.into_iter()
                .filter_map(|k| guard.remove(&k).map(|h| (k, h)))
                .map(|(k, h)| {
                    h.task.abort();
                    (k, h.callback)
                })
                .collect()
        };
        for (instance, callback) in active {
            self.spawn_refresh_task(instance, callback);
        }
    }

    /// Stops every auto-refresh timer and disposes the underlying substrate.
    /// Idempotent (calling twice is a no-op the second time).
    pub fn dispose(&self) {
        let mut guard = self.auto_refresh.lock();
        for (_, handle) in guard.drain() {
            handle.task.abort();
        }
        drop(guard);
        self.entries.dispose();
    }
}

impl DomainCache<InstanceKey, AccountCacheEntry> for AccountCache {
    fn substrate(&self) -> &Arc<ConcurrentCache<InstanceKey, AccountCacheEntry>> {
        &self.entries
    }
}
