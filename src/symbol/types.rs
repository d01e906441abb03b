//! Symbol-info domain types (spec.md §3 `SymbolInfo`).

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceFilter {
    pub min_price: f64,
    pub max_price: f64,
    pub tick_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LotSize {
    pub min_qty: f64,
    pub max_qty: f64,
    pub step_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketLotSize {
    pub min_qty: f64,
    pub max_qty: f64,
    pub step_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MinNotional {
    pub notional: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub price_filter: Option<PriceFilter>,
    pub lot_size: Option<LotSize>,
    pub market_lot_size: Option<MarketLotSize>,
    pub min_notional: Option<MinNotional>,
}

impl SymbolInfo {
    pub fn new(symbol: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            status: status.into(),
            price_filter: None,
            lot_size: None,
            market_lot_size: None,
            min_notional: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid,
}

impl ValidationResult {
    pub fn is_valid(self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}
