//! Position cache updater (spec.md §4.4 `PositionCacheUpdater`).

use super::cache::PositionCache;
use super::comparator::PositionDeltaComparator;
use super::types::{Position, PositionDelta, PositionKey, PositionReconciled, PositionStateChange, PositionUpdateOutcome};
use crate::events::EventManager;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum PositionEvent {
    Opened(Position),
    Updated(Position),
    Closed(PositionKey),
    Reconciled(PositionReconciled),
}

impl PositionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PositionEvent::Opened(_) => "POSITION_OPENED",
            PositionEvent::Updated(_) => "POSITION_UPDATED",
            PositionEvent::Closed(_) => "POSITION_CLOSED",
            PositionEvent::Reconciled(_) => "reconciled",
        }
    }
}

pub struct PositionCacheUpdater {
    cache: Arc<PositionCache>,
    events: EventManager<PositionEvent>,
    merge_lock: Mutex<()>,
}

impl PositionCacheUpdater {
    pub fn new(cache: Arc<PositionCache>) -> Self {
        Self {
            cache,
            events: EventManager::new(),
            merge_lock: Mutex::new(()),
        }
    }

    pub fn events(&self) -> &EventManager<PositionEvent> {
        &self.events
    }

    /// spec.md §4.4: computes the delta under lock, releases, then applies it.
    pub fn refresh_from_snapshot(&self, source: Vec<Position>) {
        let delta = {
            let _guard = self.merge_lock.lock();
            let current = self.cache.get_active_positions();
            PositionDeltaComparator::compare(&current, &source)
        };
        self.apply_delta(delta);
    }

    /// spec.md §4.4 `applyDelta`: emits `POSITION_CLOSED`/`POSITION_UPDATED`/
    /// `POSITION_OPENED` per item, then a trailing `reconciled` summary.
    pub fn apply_delta(&self, delta: PositionDelta) {
        let _guard = self.merge_lock.lock();
        let deleted = delta.to_delete.len();
        let updated = delta.to_update.len();
        let created = delta.to_create.len();

        for key in delta.to_delete {
            self.cache.update(flatten(&key));
            self.events.emit("POSITION_CLOSED", PositionEvent::Closed(key));
        }
        for position in delta.to_update {
            self.cache.update(position.clone());
            self.events.emit("POSITION_UPDATED", PositionEvent::Updated(position));
        }
        for position in delta.to_create {
            self.cache.update(position.clone());
            self.events.emit("POSITION_OPENED", PositionEvent::Opened(position));
        }

        self.events.emit(
            "reconciled",
            PositionEvent::Reconciled(PositionReconciled {
                created,
                updated,
                deleted,
                timestamp: Utc::now(),
            }),
        );
    }

    /// spec.md §4.4 `updateFromWsEvent(position) -> {stateChange, existingPosition?}`.
    pub fn update_from_ws_event(&self, mut incoming: Position) -> PositionUpdateOutcome {
        let _guard = self.merge_lock.lock();
        let key = incoming.key();
        let existing = self.cache.get(&key);

        if incoming.position_amt.abs() == 0.0 {
            let outcome = match &existing {
                Some(existing) if existing.position_amt.abs() > 0.0 => PositionStateChange::Closed,
                _ => PositionStateChange::Unchanged,
            };
            self.cache.update(incoming);
            return PositionUpdateOutcome {
                state_change: outcome,
                existing_position: existing,
            };
        }

        let state_change = match &existing {
            None => PositionStateChange::Opened,
            Some(existing) if existing.position_amt.abs() == 0.0 => PositionStateChange::Opened,
            Some(existing) if existing.position_amt.signum() != incoming.position_amt.signum() => {
                PositionStateChange::Reversed
            }
            Some(_) => PositionStateChange::Updated,
        };

        if let Some(existing) = &existing {
            if incoming.entry_price == 0.0 && existing.entry_price > 0.0 {
                incoming.entry_price = existing.entry_price;
            }
            // ACCOUNT_UPDATE position deltas don't carry these; always
            // carry them forward from the cached position.
            incoming.mark_price = existing.mark_price;
            incoming.leverage = existing.leverage;
            incoming.liquidation_price = existing.liquidation_price;
        }
        incoming.update_time = Utc::now().timestamp_millis();
        self.cache.update(incoming);

        PositionUpdateOutcome {
            state_change,
            existing_position: existing,
        }
    }
}

/// `toDelete` only carries the key; reuse a zero-amount position so
/// `PositionCache::update`'s existing "flat removes" path does the work.
fn flatten(key: &PositionKey) -> Position {
    Position {
        symbol: key.symbol.to_string(),
        position_side: key.position_side,
        position_amt: 0.0,
        entry_price: 0.0,
        mark_price: 0.0,
        unrealized_profit: 0.0,
        realized_profit: 0.0,
        margin_type: super::types::MarginType::Crossed,
        leverage: 0,
        liquidation_price: 0.0,
        isolated_wallet: 0.0,
        notional: 0.0,
        update_time: Utc::now().timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
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

    // S3 — position reversal.
    #[test]
    fn reversal_is_detected_and_cache_reflects_new_side() {
        let cache = PositionCache::new(CacheConfig::named("positions"));
        let updater = PositionCacheUpdater::new(cache.clone());
        updater.update_from_ws_event(position("BTCUSDT", 1.0, 100.0, 10));

        let outcome = updater.update_from_ws_event(position("BTCUSDT", -2.0, 110.0, 20));
        assert_eq!(outcome.state_change, PositionStateChange::Reversed);
        assert_eq!(outcome.existing_position.unwrap().position_amt, 1.0);

        let stored = cache.get(&PositionKey::new("BTCUSDT", PositionSide::Both)).unwrap();
        assert_eq!(stored.position_amt, -2.0);
        assert_eq!(stored.entry_price, 110.0);
    }

    #[test]
    fn opening_from_nothing_reports_opened() {
        let cache = PositionCache::new(CacheConfig::named("positions"));
        let updater = PositionCacheUpdater::new(cache);
        let outcome = updater.update_from_ws_event(position("ETHUSDT", 2.0, 2000.0, 10));
        assert_eq!(outcome.state_change, PositionStateChange::Opened);
        assert!(outcome.existing_position.is_none());
    }
}
