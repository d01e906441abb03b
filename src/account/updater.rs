//! Account cache updater (spec.md §4.3 merge rules, §4.8 event fan-out).
//!
//! One updater per instance, matching the one-`Mutex<()>`-per-instance
//! concurrency model laid out in SPEC_FULL.md §5: a snapshot refresh or a
//! WS delta merge is a plain read-compute-write with no `.await` inside the
//! critical section, so `parking_lot::Mutex` is correct and cheaper than
//! `tokio::sync::Mutex`.

use super::cache::AccountCache;
use super::types::{AccountBalance, AssetBalance, BalanceDelta};
use crate::events::EventManager;
use crate::instance::InstanceKey;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

/// Minimum absolute wallet-balance change that is worth telling listeners
/// about (spec.md §4.3 "emit balanceUpdated only past a {1e-7} threshold").
const BALANCE_EMIT_THRESHOLD: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    BalanceUpdated {
        instance: InstanceKey,
        asset: String,
        previous_balance: f64,
        new_balance: f64,
        change: f64,
        timestamp: i64,
        transaction_time: Option<i64>,
    },
    AccountSynced {
        instance: InstanceKey,
        asset_count: usize,
        timestamp: i64,
    },
}

impl AccountEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AccountEvent::BalanceUpdated { .. } => "balanceUpdated",
            AccountEvent::AccountSynced { .. } => "accountSynced",
        }
    }
}

pub struct AccountCacheUpdater {
    cache: Arc<AccountCache>,
    instance: InstanceKey,
    events: EventManager<AccountEvent>,
    merge_lock: Mutex<()>,
}

impl AccountCacheUpdater {
    pub fn new(cache: Arc<AccountCache>, instance: InstanceKey) -> Self {
        Self {
            cache,
            instance,
            events: EventManager::new(),
            merge_lock: Mutex::new(()),
        }
    }

    pub fn instance(&self) -> &InstanceKey {
        &self.instance
    }

    pub fn events(&self) -> &EventManager<AccountEvent> {
        &self.events
    }

    /// spec.md §4.3: merges a full REST snapshot into the cache, emitting
    /// one `balanceUpdated` per asset that moved past the threshold and a
    /// trailing `accountSynced`. Returns `false` (no events emitted) if the
    /// underlying `AccountCache::update` rejected the snapshot as stale.
    pub fn refresh_from_snapshot(&self, mut balance: AccountBalance, transaction_time: Option<i64>) -> bool {
        let _guard = self.merge_lock.lock();
        let previous = self.cache.get_balance(&self.instance).data;
        balance.recompute_totals();
        if !self.cache.update(&self.instance, balance.clone(), transaction_time) {
            return false;
        }
        self.emit_balance_deltas(previous.as_ref(), &balance, transaction_time);
        self.events.emit(
            "accountSynced",
            AccountEvent::AccountSynced {
                instance: self.instance.clone(),
                asset_count: balance.assets.len(),
                timestamp: Utc::now().timestamp_millis(),
            },
        );
        true
    }

    /// spec.md §4.3: merges a WS user-data event's per-asset deltas into the
    /// cached snapshot, preserving fields the delta doesn't mention.
    pub fn update_from_ws_event(&self, deltas: Vec<BalanceDelta>, transaction_time: Option<i64>) -> bool {
        let _guard = self.merge_lock.lock();
        let previous = self.cache.get_balance(&self.instance).data;
        let mut balance = previous
            .clone()
            .unwrap_or_else(|| AccountBalance::new(Utc::now()));

        for delta in &deltas {
            let entry = balance
                .assets
                .entry(delta.asset.clone())
                .or_insert_with(|| AssetBalance::new(&delta.asset, 0.0));
            entry.wallet_balance = delta.wallet_balance;
            if let Some(cross) = delta.cross_wallet_balance {
                entry.cross_wallet_balance = cross;
            }
        }
        balance.last_update = Utc::now();
        balance.recompute_totals();

        if !self.cache.update(&self.instance, balance.clone(), transaction_time) {
            return false;
        }
        self.emit_balance_deltas(previous.as_ref(), &balance, transaction_time);
        true
    }

    fn emit_balance_deltas(
        &self,
        previous: Option<&AccountBalance>,
        current: &AccountBalance,
        transaction_time: Option<i64>,
    ) {
        for (asset, new_balance) in &current.assets {
            let previous_wallet = previous
                .and_then(|p| p.assets.get(asset))
                .map(|a| a.wallet_balance)
                .unwrap_or(0.0);
            let change = new_balance.wallet_balance - previous_wallet;
            if change.abs() >= BALANCE_EMIT_THRESHOLD {
                self.events.emit(
                    "balanceUpdated",
                    AccountEvent::BalanceUpdated {
                        instance: self.instance.clone(),
                        asset: asset.clone(),
                        previous_balance: previous_wallet,
                        new_balance: new_balance.wallet_balance,
                        change,
                        timestamp: Utc::now().timestamp_millis(),
                        transaction_time,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccountCacheConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn snapshot(asset: &str, wallet: f64) -> AccountBalance {
        let mut balance = AccountBalance::new(Utc::now());
        balance.assets.insert(asset.to_string(), AssetBalance::new(asset, wallet));
        balance
    }

    #[test]
    fn refresh_emits_balance_updated_and_account_synced() {
        let cache = AccountCache::new(AccountCacheConfig::default());
        let updater = AccountCacheUpdater::new(cache, InstanceKey::new("tenant-a"));
        let balance_count = Arc::new(AtomicU32::new(0));
        let synced_count = Arc::new(AtomicU32::new(0));

        let b = balance_count.clone();
        updater.events().on("bal", "balanceUpdated", move |_| { b.fetch_add(1, Ordering::SeqCst); }).unwrap();
        let s = synced_count.clone();
        updater.events().on("sync", "accountSynced", move |_| { s.fetch_add(1, Ordering::SeqCst); }).unwrap();

        assert!(updater.refresh_from_snapshot(snapshot("USDT", 1000.0), Some(1)));
        assert_eq!(balance_count.load(Ordering::SeqCst), 1);
        assert_eq!(synced_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refresh_below_threshold_suppresses_balance_updated() {
        let cache = AccountCache::new(AccountCacheConfig::default());
        let updater = AccountCacheUpdater::new(cache, InstanceKey::new("tenant-a"));
        let balance_count = Arc::new(AtomicU32::new(0));
        let b = balance_count.clone();
        updater.events().on("bal", "balanceUpdated", move |_| { b.fetch_add(1, Ordering::SeqCst); }).unwrap();

        assert!(updater.refresh_from_snapshot(snapshot("USDT", 1000.0), Some(1)));
        assert!(updater.refresh_from_snapshot(snapshot("USDT", 1000.0 + 1e-9), Some(2)));
        assert_eq!(balance_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ws_delta_preserves_unmentioned_fields() {
        let cache = AccountCache::new(AccountCacheConfig::default());
        let updater = AccountCacheUpdater::new(cache.clone(), InstanceKey::new("tenant-a"));
        updater.refresh_from_snapshot(snapshot("USDT", 1000.0), Some(1));

        updater.update_from_ws_event(
            vec![BalanceDelta { asset: "USDT".to_string(), wallet_balance: 1200.0, cross_wallet_balance: None }],
            Some(2),
        );

        let balance = cache.get_balance(&InstanceKey::new("tenant-a")).data.unwrap();
        let usdt = balance.assets.get("USDT").unwrap();
        assert_eq!(usdt.wallet_balance, 1200.0);
        assert_eq!(usdt.available_balance, 1000.0);
    }
}
