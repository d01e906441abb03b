//! Symbol-info cache domain (spec.md §4.6).

mod cache;
mod types;

pub use cache::SymbolInfoCache;
pub use types::{LotSize, MarketLotSize, MinNotional, PriceFilter, SymbolInfo, ValidationResult};
