//! Order cache updater (spec.md §4.5): lifecycle event taxonomy driven by
//! `executionType` for regular orders and directly by `status` for algo
//! orders.

use super::cache::OrderCache;
use super::comparator::OrderDeltaComparator;
use super::types::{AlgoOrderStatus, AlgoOrderUpdate, ExecutionType, OrderStatus, OrderUpdate};
use crate::events::EventManager;
use crate::instance::InstanceKey;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum OrderEvent {
    Created(OrderUpdate),
    Updated(OrderUpdate),
    Filled(OrderUpdate),
    PartiallyFilled(OrderUpdate),
    Cancelled(OrderUpdate),
    Expired(OrderUpdate),
    AlgoCreated(AlgoOrderUpdate),
    AlgoTriggering(AlgoOrderUpdate),
    AlgoTriggered(AlgoOrderUpdate),
    AlgoFinished(AlgoOrderUpdate),
    AlgoRejected(AlgoOrderUpdate),
    AlgoCancelled(AlgoOrderUpdate),
    AlgoExpired(AlgoOrderUpdate),
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "orderCreated",
            OrderEvent::Updated(_) => "orderUpdated",
            OrderEvent::Filled(_) => "orderFilled",
            OrderEvent::PartiallyFilled(_) => "orderPartiallyFilled",
            OrderEvent::Cancelled(_) => "orderCancelled",
            OrderEvent::Expired(_) => "orderExpired",
            OrderEvent::AlgoCreated(_) => "algoOrderCreated",
            OrderEvent::AlgoTriggering(_) => "algoOrderTriggering",
            OrderEvent::AlgoTriggered(_) => "algoOrderTriggered",
            OrderEvent::AlgoFinished(_) => "algoOrderFinished",
            OrderEvent::AlgoRejected(_) => "algoOrderRejected",
            OrderEvent::AlgoCancelled(_) => "algoOrderCancelled",
            OrderEvent::AlgoExpired(_) => "algoOrderExpired",
        }
    }
}

pub struct OrderCacheUpdater {
    cache: Arc<OrderCache>,
    events: EventManager<OrderEvent>,
    merge_lock: Mutex<()>,
}

impl OrderCacheUpdater {
    pub fn new(cache: Arc<OrderCache>) -> Self {
        Self {
            cache,
            events: EventManager::new(),
            merge_lock: Mutex::new(()),
        }
    }

    pub fn events(&self) -> &EventManager<OrderEvent> {
        &self.events
    }

    /// spec.md §4.5 executionType dispatch table. The cache `update` always
    /// runs before event emission, and a stale-rejected update emits nothing.
    pub fn update_from_ws_event(&self, order: OrderUpdate) -> bool {
        let _guard = self.merge_lock.lock();
        let event = Self::select_event(&order);
        if !self.cache.update(order) {
            return false;
        }
        if let Some(event) = event {
            let name = event.name();
            self.events.emit(name, event);
        }
        true
    }

    fn select_event(order: &OrderUpdate) -> Option<OrderEvent> {
        match (order.execution_type, order.order_status) {
            (ExecutionType::New, _) => Some(OrderEvent::Created(order.clone())),
            (ExecutionType::Trade, OrderStatus::Filled) => Some(OrderEvent::Filled(order.clone())),
            (ExecutionType::Trade, OrderStatus::PartiallyFilled) => Some(OrderEvent::PartiallyFilled(order.clone())),
            (ExecutionType::Canceled, _) => Some(OrderEvent::Cancelled(order.clone())),
            (ExecutionType::Expired, _) => Some(OrderEvent::Expired(order.clone())),
            (ExecutionType::Amendment, _) => Some(OrderEvent::Updated(order.clone())),
            // Liquidation engine fills (spec.md §4.5 table).
            (ExecutionType::Calculated, _) => Some(OrderEvent::Filled(order.clone())),
            _ => None,
        }
    }

    /// spec.md §4.5: "Algo event dispatch maps directly from AlgoOrderStatus
    /// to the corresponding event, with FINISHED and EXECUTED collapsing to
    /// algoOrderFinished."
    pub fn update_algo_from_ws_event(&self, order: AlgoOrderUpdate) -> bool {
        let _guard = self.merge_lock.lock();
        let event = match order.status {
            AlgoOrderStatus::New => OrderEvent::AlgoCreated(order.clone()),
            AlgoOrderStatus::Triggering => OrderEvent::AlgoTriggering(order.clone()),
            AlgoOrderStatus::Triggered => OrderEvent::AlgoTriggered(order.clone()),
            AlgoOrderStatus::Finished | AlgoOrderStatus::Executed => OrderEvent::AlgoFinished(order.clone()),
            AlgoOrderStatus::Rejected => OrderEvent::AlgoRejected(order.clone()),
            AlgoOrderStatus::Cancelled => OrderEvent::AlgoCancelled(order.clone()),
            AlgoOrderStatus::Expired => OrderEvent::AlgoExpired(order.clone()),
        };
        if !self.cache.update_algo_order(order) {
            return false;
        }
        self.events.emit(event.name(), event);
        true
    }

    /// spec.md §4.5: computes the delta under lock against the active set,
    /// releases, then applies it under its own lock.
    pub fn refresh_from_snapshot(&self, instance: &InstanceKey, source: Vec<OrderUpdate>) {
        let active = {
            let _guard = self.merge_lock.lock();
            self.cache.get_active_orders(instance)
        };
        let delta = OrderDeltaComparator::compare(&active, &source);
        self.apply_delta(delta);
    }

    pub fn apply_delta(&self, delta: super::types::OrderDelta) {
        let _guard = self.merge_lock.lock();
        for order in delta.to_update {
            if self.cache.update(order.clone()) {
                self.events.emit("orderUpdated", OrderEvent::Updated(order));
            }
        }
        for order in delta.to_create {
            if self.cache.update(order.clone()) {
                self.events.emit("orderCreated", OrderEvent::Created(order));
            }
        }
        // Open question (spec.md §9 "terminal-by-absence"): a cached active
        // order missing from the fresh snapshot is reported as orderFilled,
        // though it could equally be a cancellation. Not disambiguated here.
        for order in delta.to_delete {
            self.cache.remove_from_active(&order.instance, order.order_id);
            self.events.emit("orderFilled", OrderEvent::Filled(order));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderCacheConfig;
    use crate::order::types::{OrderType, Side};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn order(id: i64, execution: ExecutionType, status: OrderStatus, tt: i64) -> OrderUpdate {
        OrderUpdate {
            instance: InstanceKey::new("tenant-a"),
            order_id: id,
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            original_quantity: 1.0,
            filled_quantity: 0.0,
            original_price: 100.0,
            average_price: 0.0,
            stop_price: 0.0,
            execution_type: execution,
            order_status: status,
            event_time: tt,
            transaction_time: tt,
            trade_time: None,
        }
    }

    // S5 — stale order rejection.
    #[test]
    fn stale_update_leaves_cache_and_active_set_unchanged() {
        let cache = OrderCache::new(OrderCacheConfig::default());
        let updater = OrderCacheUpdater::new(cache.clone());
        let instance = InstanceKey::new("tenant-a");

        assert!(updater.update_from_ws_event(order(7, ExecutionType::New, OrderStatus::New, 100)));
        assert!(!updater.update_from_ws_event(order(7, ExecutionType::Canceled, OrderStatus::Canceled, 90)));

        let cached = cache.get_order(&instance, 7).data.unwrap();
        assert_eq!(cached.order_status, OrderStatus::New);
        assert_eq!(cache.get_active_orders(&instance).len(), 1);
    }

    #[test]
    fn new_order_emits_created_and_appears_active() {
        let cache = OrderCache::new(OrderCacheConfig::default());
        let updater = OrderCacheUpdater::new(cache.clone());
        let created = Arc::new(AtomicU32::new(0));
        let c = created.clone();
        updater.events().on("watch", "orderCreated", move |_| { c.fetch_add(1, Ordering::SeqCst); }).unwrap();

        updater.update_from_ws_event(order(1, ExecutionType::New, OrderStatus::New, 10));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_active_orders(&InstanceKey::new("tenant-a")).len(), 1);
    }
}
