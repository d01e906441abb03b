//! Symbol-info cache (spec.md §4.6): near-permanent exchange-rule metadata,
//! keyed by symbol, with no TTL.

use super::types::{SymbolInfo, ValidationResult};
use crate::config::{CacheConfig, SetOptions, NEVER_EXPIRE};
use crate::domain::DomainCache;
use crate::substrate::ConcurrentCache;
use std::sync::Arc;

const TOLERANCE: f64 = 1e-8;

pub struct SymbolInfoCache {
    entries: Arc<ConcurrentCache<String, SymbolInfo>>,
}

impl SymbolInfoCache {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            entries: ConcurrentCache::new(CacheConfig {
                default_ttl_ms: NEVER_EXPIRE,
                ..CacheConfig::named(name)
            }),
        })
    }

    /// spec.md §4.6 `updateFromExchangeInfo(symbols[])`: bulk-load.
    pub fn update_from_exchange_info(&self, symbols: Vec<SymbolInfo>) {
        for symbol in symbols {
            self.entries.set(symbol.symbol.clone(), symbol, SetOptions::default());
        }
    }

    pub fn get(&self, symbol: &str) -> Option<SymbolInfo> {
        self.entries.get(&symbol.to_string())
    }

    /// spec.md §4.6: `minPrice ≤ price ≤ maxPrice` and `price mod tickSize ≈ 0`.
    /// Missing filter is permissive (accept).
    pub fn validate_price(&self, symbol: &str, price: f64) -> ValidationResult {
        let Some(info) = self.get(symbol) else { return ValidationResult::Valid };
        let Some(filter) = info.price_filter else { return ValidationResult::Valid };
        let in_range = price >= filter.min_price - TOLERANCE && price <= filter.max_price + TOLERANCE;
        let on_tick = filter.tick_size <= 0.0 || remainder_near_zero(price, filter.tick_size);
        if in_range && on_tick {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid
        }
    }

    /// spec.md §4.6: analogous to `validatePrice` with `stepSize`.
    pub fn validate_quantity(&self, symbol: &str, quantity: f64) -> ValidationResult {
        let Some(info) = self.get(symbol) else { return ValidationResult::Valid };
        let Some(filter) = info.lot_size else { return ValidationResult::Valid };
        let in_range = quantity >= filter.min_qty - TOLERANCE && quantity <= filter.max_qty + TOLERANCE;
        let on_step = filter.step_size <= 0.0 || remainder_near_zero(quantity, filter.step_size);
        if in_range && on_step {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid
        }
    }

    /// spec.md §4.6: `price × quantity ≥ minNotional`.
    pub fn validate_notional(&self, symbol: &str, price: f64, quantity: f64) -> ValidationResult {
        let Some(info) = self.get(symbol) else { return ValidationResult::Valid };
        let Some(filter) = info.min_notional else { return ValidationResult::Valid };
        if price * quantity >= filter.notional - TOLERANCE {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid
        }
    }

    /// Rounds `price` down to the nearest `tickSize` multiple.
    pub fn round_price(&self, symbol: &str, price: f64) -> f64 {
        match self.get(symbol).and_then(|i| i.price_filter) {
            Some(filter) if filter.tick_size > 0.0 => floor_to_step(price, filter.tick_size),
            _ => price,
        }
    }

    /// Rounds `quantity` down to the nearest `stepSize` multiple.
    pub fn round_quantity(&self, symbol: &str, quantity: f64) -> f64 {
        match self.get(symbol).and_then(|i| i.lot_size) {
            Some(filter) if filter.step_size > 0.0 => floor_to_step(quantity, filter.step_size),
            _ => quantity,
        }
    }
}

impl DomainCache<String, SymbolInfo> for SymbolInfoCache {
    fn substrate(&self) -> &Arc<ConcurrentCache<String, SymbolInfo>> {
        &self.entries
    }
}

fn remainder_near_zero(value: f64, step: f64) -> bool {
    let remainder = value % step;
    remainder.abs() <= TOLERANCE || (step - remainder.abs()) <= TOLERANCE
}

fn floor_to_step(value: f64, step: f64) -> f64 {
    (value / step).floor() * step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::types::{LotSize, PriceFilter};

    fn btcusdt() -> SymbolInfo {
        let mut info = SymbolInfo::new("BTCUSDT", "TRADING");
        info.price_filter = Some(PriceFilter { min_price: 1.0, max_price: 1_000_000.0, tick_size: 0.1 });
        info.lot_size = Some(LotSize { min_qty: 0.001, max_qty: 1000.0, step_size: 0.001 });
        info
    }

    #[test]
    fn price_on_tick_is_valid() {
        let cache = SymbolInfoCache::new("symbols");
        cache.update_from_exchange_info(vec![btcusdt()]);
        assert!(cache.validate_price("BTCUSDT", 100.1).is_valid());
        assert!(!cache.validate_price("BTCUSDT", 100.15).is_valid());
    }

    #[test]
    fn missing_symbol_is_permissive() {
        let cache = SymbolInfoCache::new("symbols");
        assert!(cache.validate_price("UNKNOWN", 12345.678).is_valid());
    }

    #[test]
    fn round_quantity_floors_to_step() {
        let cache = SymbolInfoCache::new("symbols");
        cache.update_from_exchange_info(vec![btcusdt()]);
        let rounded = cache.round_quantity("BTCUSDT", 1.2347);
        assert!((rounded - 1.234).abs() < 1e-9);
    }
}
