//! Position delta comparator (spec.md §4.4 `PositionDeltaComparator`).

use super::types::{Position, PositionDelta};

/// Absolute tolerance for all quantity/price comparisons (spec.md §9).
const TOLERANCE: f64 = 1e-8;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE
}

/// spec.md §4.4 `compare(cache, source) -> {toCreate, toUpdate, toDelete}`.
pub struct PositionDeltaComparator;

impl PositionDeltaComparator {
    pub fn compare(cache: &[Position], source: &[Position]) -> PositionDelta {
        let mut delta = PositionDelta::default();
        let mut seen_keys = std::collections::HashSet::new();

        for incoming in source {
            let key = incoming.key();
            seen_keys.insert(key.clone());
            let cached = cache.iter().find(|p| p.key() == key);

            match (incoming.position_amt.abs() == 0.0, cached) {
                // Rule 1: source reports flat, cache holds a non-zero position.
                (true, Some(cached)) if cached.position_amt.abs() > 0.0 => {
                    delta.to_delete.push(key);
                }
                (true, _) => {}
                // Rule 2: key absent in cache.
                (false, None) => delta.to_create.push(incoming.clone()),
                // Rule 3/4: compare field-by-field, else merge.
                (false, Some(cached)) => {
                    if Self::fields_equal(cached, incoming) {
                        // Rule 3: equal within tolerance, emit nothing.
                    } else {
                        delta.to_update.push(Self::merge(cached, incoming));
                    }
                }
            }
        }

        // Rule 5: every cache key absent from source goes to toDelete.
        for cached in cache {
            let key = cached.key();
            if !seen_keys.contains(&key) && !delta.to_delete.contains(&key) {
                delta.to_delete.push(key);
            }
        }

        delta
    }

    fn fields_equal(cached: &Position, source: &Position) -> bool {
        approx_eq(cached.position_amt, source.position_amt)
            && approx_eq(cached.entry_price, source.entry_price)
            && approx_eq(cached.mark_price, source.mark_price)
            && approx_eq(cached.unrealized_profit, source.unrealized_profit)
            && cached.margin_type == source.margin_type
            && cached.leverage == source.leverage
            && approx_eq(cached.liquidation_price, source.liquidation_price)
            && approx_eq(cached.isolated_wallet, source.isolated_wallet)
    }

    /// Rule 4: take source fields, but preserve `entryPrice`/`markPrice`/`realizedProfit`
    /// from cache per the conditions in spec.md §4.4.
    fn merge(cached: &Position, source: &Position) -> Position {
        let mut merged = source.clone();
        if source.entry_price == 0.0 && cached.entry_price > 0.0 {
            merged.entry_price = cached.entry_price;
        }
        merged.realized_profit = cached.realized_profit;
        if source.mark_price == 0.0 {
            merged.mark_price = cached.mark_price;
        }
        merged
    }
}
