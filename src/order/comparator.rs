//! Order delta comparator (spec.md §4.5 `OrderDeltaComparator`).

use super::types::{CacheAction, CacheDecision, OrderDelta, OrderUpdate};

/// Absolute tolerance for all quantity/price comparisons (spec.md §9),
/// matching `PositionDeltaComparator::approx_eq`.
const TOLERANCE: f64 = 1e-8;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE
}

fn differs(cached: &OrderUpdate, source: &OrderUpdate) -> bool {
    cached.order_status != source.order_status
        || !approx_eq(cached.filled_quantity, source.filled_quantity)
        || !approx_eq(cached.average_price, source.average_price)
        || !approx_eq(cached.original_price, source.original_price)
        || !approx_eq(cached.original_quantity, source.original_quantity)
}

pub struct OrderDeltaComparator;

impl OrderDeltaComparator {
    /// `cache` should be the instance's *active* orders (spec.md §4.5:
    /// "for each cached active order absent from source, toDelete").
    pub fn compare(cache: &[OrderUpdate], source: &[OrderUpdate]) -> OrderDelta {
        let mut delta = OrderDelta::default();
        let mut seen = std::collections::HashSet::new();

        for incoming in source {
            seen.insert(incoming.order_id);
            match cache.iter().find(|o| o.order_id == incoming.order_id) {
                None => delta.to_create.push(incoming.clone()),
                Some(cached) if differs(cached, incoming) => delta.to_update.push(incoming.clone()),
                Some(_) => {}
            }
        }

        for cached in cache {
            if !seen.contains(&cached.order_id) {
                delta.to_delete.push(cached.clone());
            }
        }

        delta
    }

    /// spec.md §4.5 `shouldUpdateCache(ws, cached?)`: governs WS dispatch
    /// when a delta isn't desired (e.g. a transaction-time regression).
    pub fn should_update_cache(ws: &OrderUpdate, cached: Option<&OrderUpdate>) -> CacheDecision {
        match cached {
            None => CacheDecision { action: CacheAction::Create, reason: "no cached order for this id" },
            Some(cached) if ws.transaction_time < cached.transaction_time => {
                CacheDecision { action: CacheAction::Ignore, reason: "stale transaction time" }
            }
            Some(cached) if ws.order_status.is_terminal() && cached.order_status.is_active() => {
                CacheDecision { action: CacheAction::Delete, reason: "order became terminal" }
            }
            Some(cached) if !differs(cached, ws) => {
                CacheDecision { action: CacheAction::Ignore, reason: "no observable change" }
            }
            Some(_) => CacheDecision { action: CacheAction::Update, reason: "fields changed" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceKey;
    use crate::order::types::{ExecutionType, OrderStatus, OrderType, Side};

    fn order(id: i64, status: OrderStatus, filled: f64, tt: i64) -> OrderUpdate {
        OrderUpdate {
            instance: InstanceKey::new("tenant-a"),
            order_id: id,
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            original_quantity: 1.0,
            filled_quantity: filled,
            original_price: 100.0,
            average_price: 0.0,
            stop_price: 0.0,
            execution_type: ExecutionType::New,
            order_status: status,
            event_time: tt,
            transaction_time: tt,
            trade_time: None,
        }
    }

    // S4 — snapshot delta on orders.
    #[test]
    fn snapshot_delta_matches_scenario_seed() {
        let cache = vec![
            order(1, OrderStatus::New, 0.0, 1),
            order(2, OrderStatus::PartiallyFilled, 0.3, 1),
        ];
        let source = vec![
            order(1, OrderStatus::PartiallyFilled, 0.5, 2),
            order(3, OrderStatus::New, 0.0, 2),
        ];

        let delta = OrderDeltaComparator::compare(&cache, &source);
        assert_eq!(delta.to_create.iter().map(|o| o.order_id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(delta.to_update.iter().map(|o| o.order_id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(delta.to_delete.iter().map(|o| o.order_id).collect::<Vec<_>>(), vec![2]);
    }
}
