//! Order cache (spec.md §4.5). Regular and algo orders occupy distinct
//! substrates and distinct active-order indexes, grounded on the teacher's
//! `backtest_v2::oms::OmsOrder` active/terminal split and
//! `src/edge/receiver.rs`'s per-symbol `RwLock<HashMap<...>>` secondary index.

use super::types::{AlgoOrderKey, AlgoOrderStatus, AlgoOrderUpdate, OrderKey, OrderStats, OrderStatus, OrderUpdate};
use crate::config::{CacheConfig, OrderCacheConfig, SetOptions};
use crate::instance::InstanceKey;
use crate::result::ReadResult;
use crate::substrate::ConcurrentCache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub struct OrderCache {
    orders: Arc<ConcurrentCache<OrderKey, OrderUpdate>>,
    algo_orders: Arc<ConcurrentCache<AlgoOrderKey, AlgoOrderUpdate>>,
    active_orders: RwLock<HashMap<InstanceKey, HashMap<i64, OrderUpdate>>>,
    active_algo_orders: RwLock<HashMap<InstanceKey, HashMap<i64, AlgoOrderUpdate>>>,
    last_update_by_instance: RwLock<HashMap<InstanceKey, i64>>,
}

impl OrderCache {
    pub fn new(config: OrderCacheConfig) -> Arc<Self> {
        Arc::new(Self {
            orders: ConcurrentCache::new(config.cache.clone()),
            algo_orders: ConcurrentCache::new(CacheConfig::named(format!("{}-algo", config.cache.name))),
            active_orders: RwLock::new(HashMap::new()),
            active_algo_orders: RwLock::new(HashMap::new()),
            last_update_by_instance: RwLock::new(HashMap::new()),
        })
    }

    /// spec.md §4.5 `update`. Returns `true` if applied, `false` if rejected as stale.
    pub fn update(&self, order: OrderUpdate) -> bool {
        let key = order.key();
        if let Some(existing) = self.orders.get(&key) {
            if order.transaction_time < existing.transaction_time {
                tracing::warn!(
                    instance = %order.instance,
                    order_id = order.order_id,
                    incoming = order.transaction_time,
                    cached = existing.transaction_time,
                    "rejecting stale order update"
                );
                return false;
            }
        }

        self.orders.set(key, order.clone(), SetOptions::default());
        self.last_update_by_instance
            .write()
            .insert(order.instance.clone(), order.transaction_time);

        let mut active = self.active_orders.write();
        let per_instance = active.entry(order.instance.clone()).or_default();
        if order.order_status.is_active() {
            per_instance.insert(order.order_id, order);
        } else {
            per_instance.remove(&order.order_id);
        }
        true
    }

    /// spec.md §4.5 `updateAlgoOrder`, analogous, active set `{NEW, TRIGGERING}`.
    pub fn update_algo_order(&self, order: AlgoOrderUpdate) -> bool {
        let key = order.key();
        if let Some(existing) = self.algo_orders.get(&key) {
            if order.transaction_time < existing.transaction_time {
                tracing::warn!(
                    instance = %order.instance,
                    algo_id = order.algo_id,
                    incoming = order.transaction_time,
                    cached = existing.transaction_time,
                    "rejecting stale algo order update"
                );
                return false;
            }
        }

        self.algo_orders.set(key, order.clone(), SetOptions::default());

        let mut active = self.active_algo_orders.write();
        let per_instance = active.entry(order.instance.clone()).or_default();
        if matches!(order.status, AlgoOrderStatus::New | AlgoOrderStatus::Triggering) {
            per_instance.insert(order.algo_id, order);
        } else {
            per_instance.remove(&order.algo_id);
        }
        true
    }

    pub fn get_order(&self, instance: &InstanceKey, order_id: i64) -> ReadResult<OrderUpdate> {
        let start = Instant::now();
        let key = OrderKey { instance: instance.clone(), order_id };
        match self.orders.get(&key) {
            Some(order) => ReadResult::ok(order, start.elapsed().as_secs_f64() * 1000.0),
            None => ReadResult::missing("Order not found", start.elapsed().as_secs_f64() * 1000.0),
        }
    }

    fn orders_for_instance(&self, instance: &InstanceKey) -> Vec<OrderUpdate> {
        self.orders
            .filter(|key, _| &key.instance == instance)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    /// spec.md §4.5 `getRecentOrders(instanceKey, limit)`.
    pub fn get_recent_orders(&self, instance: &InstanceKey, limit: usize) -> Vec<OrderUpdate> {
        let mut orders = self.orders_for_instance(instance);
        orders.sort_by(|a, b| b.transaction_time.cmp(&a.transaction_time));
        orders.truncate(limit);
        orders
    }

    pub fn get_active_orders(&self, instance: &InstanceKey) -> Vec<OrderUpdate> {
        self.active_orders
            .read()
            .get(instance)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_active_algo_orders(&self, instance: &InstanceKey) -> Vec<AlgoOrderUpdate> {
        self.active_algo_orders
            .read()
            .get(instance)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_orders_by_symbol(&self, instance: &InstanceKey, symbol: &str) -> Vec<OrderUpdate> {
        self.orders
            .filter(|key, order| &key.instance == instance && order.symbol.as_str() == symbol)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    pub fn get_orders_by_status(&self, instance: &InstanceKey, status: OrderStatus) -> Vec<OrderUpdate> {
        self.orders
            .filter(|key, order| &key.instance == instance && order.order_status == status)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    pub fn get_order_stats(&self, instance: &InstanceKey) -> OrderStats {
        let all = self.orders_for_instance(instance);
        let active = all.iter().filter(|o| o.order_status.is_active()).count();
        OrderStats {
            total: all.len(),
            active,
            terminal: all.len() - active,
        }
    }

    /// Removes an order from the active-order index without touching the
    /// underlying stored record. Used by `OrderCacheUpdater::apply_delta`
    /// for the "terminal-by-absence" case (spec.md §9 open question): the
    /// reconciler knows the order left the active set but not its true
    /// final status, so the stored record is left as last observed.
    pub fn remove_from_active(&self, instance: &InstanceKey, order_id: i64) {
        if let Some(per_instance) = self.active_orders.write().get_mut(instance) {
            per_instance.remove(&order_id);
        }
    }

    /// spec.md §4.5 `clearInstance` (removes all composite-key entries plus active maps).
    pub fn clear_instance(&self, instance: &InstanceKey) {
        for (key, _) in self.orders.filter(|key, _| &key.instance == instance) {
            self.orders.remove(&key);
        }
        for (key, _) in self.algo_orders.filter(|key, _| &key.instance == instance) {
            self.algo_orders.remove(&key);
        }
        self.active_orders.write().remove(instance);
        self.active_algo_orders.write().remove(instance);
        self.last_update_by_instance.write().remove(instance);
    }

    pub fn get_stats(&self) -> crate::substrate::CacheStats {
        self.orders.get_stats()
    }

    pub fn dispose(&self) {
        self.orders.dispose();
        self.algo_orders.dispose();
        self.active_orders.write().clear();
        self.active_algo_orders.write().clear();
    }
}
