//! Integration tests for the scenario seeds in spec.md §8, driven through
//! `CacheRegistry` rather than individual cache/updater unit tests.

use trading_recon_cache::account::AccountBalance;
use trading_recon_cache::account::AssetBalance;
use trading_recon_cache::instance::InstanceKey;
use trading_recon_cache::order::{ExecutionType, OrderStatus, OrderType, OrderUpdate, Side};
use trading_recon_cache::position::{MarginType, Position, PositionSide, PositionStateChange};
use trading_recon_cache::registry::{CacheRegistry, RegistryConfig};

fn order(instance: &InstanceKey, id: i64, execution: ExecutionType, status: OrderStatus, tt: i64) -> OrderUpdate {
    OrderUpdate {
        instance: instance.clone(),
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

fn position(symbol: &str, amt: f64, entry: f64, update_time: i64) -> Position {
    Position {
        symbol: symbol.to_string(),
        position_side: PositionSide::Both,
        position_amt: amt,
        entry_price: entry,
        mark_price: entry,
        unrealized_profit: 0.0,
        realized_profit: 0.0,
        margin_type: MarginType::Crossed,
        leverage: 10,
        liquidation_price: 0.0,
        isolated_wallet: 0.0,
        notional: entry * amt.abs(),
        update_time,
    }
}

// S3 — position reversal, driven through the registry's per-instance updater.
#[test]
fn scenario_s3_position_reversal_through_registry() {
    let registry = CacheRegistry::new(RegistryConfig::default());
    let instance = InstanceKey::new("tenant-a");
    registry.register_instance(instance.clone());
    let updater = registry.position_updater(&instance).unwrap();

    updater.update_from_ws_event(position("BTCUSDT", 1.0, 100.0, 10));
    let outcome = updater.update_from_ws_event(position("BTCUSDT", -2.0, 110.0, 20));

    assert_eq!(outcome.state_change, PositionStateChange::Reversed);
    assert_eq!(outcome.existing_position.unwrap().position_amt, 1.0);

    let cache = registry.position_cache(&instance).unwrap();
    let stored = cache
        .get(&trading_recon_cache::position::PositionKey::new("BTCUSDT", PositionSide::Both))
        .unwrap();
    assert_eq!(stored.position_amt, -2.0);
    assert_eq!(stored.entry_price, 110.0);
}

// S4 — snapshot delta on orders, driven through the registry's shared order updater.
#[test]
fn scenario_s4_snapshot_delta_on_orders() {
    let registry = CacheRegistry::new(RegistryConfig::default());
    let instance = InstanceKey::new("tenant-a");
    registry.register_instance(instance.clone());
    let updater = registry.order_updater();

    updater.update_from_ws_event(order(&instance, 1, ExecutionType::New, OrderStatus::New, 1));
    updater.update_from_ws_event(order(&instance, 2, ExecutionType::New, OrderStatus::PartiallyFilled, 1));

    let snapshot = vec![
        order(&instance, 1, ExecutionType::Trade, OrderStatus::PartiallyFilled, 2),
        order(&instance, 3, ExecutionType::New, OrderStatus::New, 2),
    ];
    updater.refresh_from_snapshot(&instance, snapshot);

    let cache = registry.order_cache();
    let mut active_ids: Vec<i64> = cache.get_active_orders(&instance).iter().map(|o| o.order_id).collect();
    active_ids.sort();
    assert_eq!(active_ids, vec![1, 3]);
}

// S5 — stale order rejection.
#[test]
fn scenario_s5_stale_order_rejection() {
    let registry = CacheRegistry::new(RegistryConfig::default());
    let instance = InstanceKey::new("tenant-a");
    registry.register_instance(instance.clone());
    let updater = registry.order_updater();

    assert!(updater.update_from_ws_event(order(&instance, 7, ExecutionType::New, OrderStatus::New, 100)));
    assert!(!updater.update_from_ws_event(order(&instance, 7, ExecutionType::Canceled, OrderStatus::Canceled, 90)));

    let cache = registry.order_cache();
    assert_eq!(cache.get_order(&instance, 7).data.unwrap().order_status, OrderStatus::New);
    assert_eq!(cache.get_active_orders(&instance).len(), 1);
}

// S6 — account balance delta emission.
#[test]
fn scenario_s6_account_balance_delta_emission() {
    let registry = CacheRegistry::new(RegistryConfig::default());
    let instance = InstanceKey::new("tenant-a");
    registry.register_instance(instance.clone());
    let updater = registry.account_updater(&instance).unwrap();

    let mut prior = AccountBalance::new(chrono::Utc::now());
    prior.assets.insert("USDT".to_string(), AssetBalance::new("USDT", 1000.0));
    updater.refresh_from_snapshot(prior, Some(1));

    let balance_events = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let synced_events = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let b = balance_events.clone();
    updater
        .events()
        .on("watch-balance", "balanceUpdated", move |event| {
            if let trading_recon_cache::account::AccountEvent::BalanceUpdated { asset, new_balance, previous_balance, .. } = event {
                b.lock().push((asset.clone(), *previous_balance, *new_balance));
            }
        })
        .unwrap();
    let s = synced_events.clone();
    updater
        .events()
        .on("watch-synced", "accountSynced", move |_| { s.fetch_add(1, std::sync::atomic::Ordering::SeqCst); })
        .unwrap();

    let mut next = AccountBalance::new(chrono::Utc::now());
    next.assets.insert("USDT".to_string(), AssetBalance::new("USDT", 1250.0000001));
    updater.refresh_from_snapshot(next, Some(2));

    let events = balance_events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "USDT");
    assert_eq!(events[0].1, 1000.0);
    assert!((events[0].2 - 1250.0000001).abs() < 1e-9);
    assert_eq!(synced_events.load(std::sync::atomic::Ordering::SeqCst), 1);
}
