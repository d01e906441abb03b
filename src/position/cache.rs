//! Position cache (spec.md §4.4).
//!
//! Grounded on the teacher's `backtest_v2::oms::OmsOrder`-style state
//! container (own substrate, own narrow mutation surface) and on
//! `other_examples/0f31c19a_...-order-new.rs.rs`'s `AccountState`/position
//! bookkeeping for the "keyed by (symbol, side)" shape.

use super::types::{Position, PositionKey, PositionStats};
use crate::config::{CacheConfig, SetOptions};
use crate::domain::DomainCache;
use crate::events::EventManager;
use crate::substrate::ConcurrentCache;
use std::sync::Arc;

/// spec.md §4.4: `positionClosed`, `replaced`, `cleared`.
#[derive(Debug, Clone)]
pub enum PositionCacheEvent {
    Closed { key: PositionKey },
    Replaced { count: usize },
    Cleared,
}

impl PositionCacheEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PositionCacheEvent::Closed { .. } => "positionClosed",
            PositionCacheEvent::Replaced { .. } => "replaced",
            PositionCacheEvent::Cleared => "cleared",
        }
    }
}

pub struct PositionCache {
    entries: Arc<ConcurrentCache<PositionKey, Position>>,
    events: EventManager<PositionCacheEvent>,
}

impl PositionCache {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            entries: ConcurrentCache::new(config),
            events: EventManager::new(),
        })
    }

    pub fn events(&self) -> &EventManager<PositionCacheEvent> {
        &self.events
    }

    /// spec.md §4.4 `update`. Returns `true` if the cache was changed.
    pub fn update(&self, position: Position) -> bool {
        let key = position.key();
        if position.is_flat() {
            if self.entries.remove(&key) {
                self.events.emit("positionClosed", PositionCacheEvent::Closed { key });
            }
            return true;
        }

        if let Some(existing) = self.entries.get(&key) {
            if position.update_time < existing.update_time {
                tracing::warn!(%key, incoming = position.update_time, cached = existing.update_time, "rejecting stale position update");
                return false;
            }
        }

        self.entries.set(key, position, SetOptions::default());
        true
    }

    /// spec.md §4.4 `updateMarkPrice`.
    pub fn update_mark_price(&self, symbol: &str, mark_price: f64, position_side: super::types::PositionSide) {
        let key = PositionKey::new(symbol, position_side);
        if let Some(mut position) = self.entries.get(&key) {
            position.mark_price = mark_price;
            position.recompute_unrealized_profit();
            position.notional = mark_price * position.position_amt.abs();
            self.entries.set(key, position, SetOptions::default());
        }
    }

    /// spec.md §4.4 `updateLeverage`.
    pub fn update_leverage(&self, symbol: &str, leverage: u32, position_side: super::types::PositionSide) {
        let key = PositionKey::new(symbol, position_side);
        if let Some(mut position) = self.entries.get(&key) {
            position.leverage = leverage;
            self.entries.set(key, position, SetOptions::default());
        }
    }

    /// spec.md §4.4 `replaceAll` (atomic, emits `replaced{count}`).
    pub fn replace_all(&self, positions: Vec<Position>) {
        self.entries.clear();
        let count = positions.len();
        for position in positions {
            self.entries.set(position.key(), position, SetOptions::default());
        }
        self.events.emit("replaced", PositionCacheEvent::Replaced { count });
    }

    pub fn get(&self, key: &PositionKey) -> Option<Position> {
        self.entries.get(key)
    }

    pub fn get_by_symbol(&self, symbol: &str) -> Vec<Position> {
        self.entries
            .filter(|key, _| key.symbol.as_str() == symbol)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    /// spec.md §4.4 `getActivePositions` (filter `|positionAmt| > 0`).
    pub fn get_active_positions(&self) -> Vec<Position> {
        self.entries
            .filter(|_, position| position.position_amt.abs() > 0.0)
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    pub fn get_position_stats(&self) -> PositionStats {
        let all = self.entries.get_all();
        let active: Vec<_> = all.iter().filter(|p| p.position_amt.abs() > 0.0).collect();
        PositionStats {
            total: all.len(),
            active: active.len(),
            total_notional: active.iter().map(|p| p.notional).sum(),
            total_unrealized_profit: active.iter().map(|p| p.unrealized_profit).sum(),
        }
    }

    /// spec.md §4.4 `clear()` additionally emits `cleared`.
    pub fn clear(&self) {
        self.entries.clear();
        self.events.emit("cleared", PositionCacheEvent::Cleared);
    }

    /// spec.md §4.4 `dispose()` removes all listeners.
    pub fn dispose(&self) {
        self.events.clear();
        self.entries.dispose();
    }
}

impl DomainCache<PositionKey, Position> for PositionCache {
    fn substrate(&self) -> &Arc<ConcurrentCache<PositionKey, Position>> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::types::{MarginType, PositionSide};

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

    // Testable property 2.
    #[test]
    fn closing_a_position_emits_closed_once() {
        let cache = PositionCache::new(CacheConfig::named("positions"));
        let closed = Arc::new(parking_lot::Mutex::new(0));
        let c = closed.clone();
        cache.events().on("watch", "positionClosed", move |_| { *c.lock() += 1; }).unwrap();

        cache.update(position("BTCUSDT", 1.0, 100.0, 10));
        cache.update(position("BTCUSDT", 0.0, 100.0, 20));

        assert!(cache.get(&PositionKey::new("BTCUSDT", PositionSide::Both)).is_none());
        assert_eq!(*closed.lock(), 1);
    }

    #[test]
    fn stale_update_is_rejected() {
        let cache = PositionCache::new(CacheConfig::named("positions"));
        cache.update(position("BTCUSDT", 1.0, 100.0, 20));
        assert!(!cache.update(position("BTCUSDT", 2.0, 105.0, 10)));
        let cached = cache.get(&PositionKey::new("BTCUSDT", PositionSide::Both)).unwrap();
        assert_eq!(cached.position_amt, 1.0);
    }

    #[test]
    fn update_mark_price_recomputes_unrealized_profit() {
        let cache = PositionCache::new(CacheConfig::named("positions"));
        cache.update(position("BTCUSDT", 2.0, 100.0, 10));
        cache.update_mark_price("BTCUSDT", 110.0, PositionSide::Both);
        let updated = cache.get(&PositionKey::new("BTCUSDT", PositionSide::Both)).unwrap();
        assert_eq!(updated.unrealized_profit, 20.0);
        assert_eq!(updated.notional, 220.0);
    }
}
