//! Position domain types (spec.md §3 `Position`).

use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
            PositionSide::Both => "BOTH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MarginType {
    Isolated,
    Crossed,
}

/// Composite key `(symbol, positionSide)` — a typed struct rather than the
/// reference's `"{symbol}|{positionSide}"` delimited string (spec.md §9
/// "Composite keys").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub symbol: SmolStr,
    pub position_side: PositionSide,
}

impl PositionKey {
    pub fn new(symbol: impl AsRef<str>, position_side: PositionSide) -> Self {
        Self {
            symbol: SmolStr::new(symbol.as_ref()),
            position_side,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.symbol, self.position_side)
    }
}

/// spec.md §3 `Position`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub symbol: String,
    pub position_side: PositionSide,
    /// Signed: positive long, negative short, zero closed.
    pub position_amt: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_profit: f64,
    pub realized_profit: f64,
    pub margin_type: MarginType,
    pub leverage: u32,
    pub liquidation_price: f64,
    pub isolated_wallet: f64,
    pub notional: f64,
    pub update_time: i64,
}

impl Position {
    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.symbol, self.position_side)
    }

    /// spec.md §3 invariant: "on every update, `unrealizedProfit = sign(positionAmt)
    /// × (markPrice − entryPrice) × |positionAmt|` whenever markPrice is refreshed."
    pub fn recompute_unrealized_profit(&mut self) {
        self.unrealized_profit = self.position_amt.signum() * (self.mark_price - self.entry_price) * self.position_amt.abs();
    }

    pub fn is_flat(&self) -> bool {
        self.position_amt == 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct PositionStats {
    pub total: usize,
    pub active: usize,
    pub total_notional: f64,
    pub total_unrealized_profit: f64,
}

/// WS merge outcome for `PositionCacheUpdater::update_from_ws_event` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStateChange {
    Opened,
    Reversed,
    Updated,
    Closed,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct PositionUpdateOutcome {
    pub state_change: PositionStateChange,
    pub existing_position: Option<Position>,
}

/// spec.md §4.4 `PositionDeltaComparator.compare` output.
#[derive(Debug, Clone, Default)]
pub struct PositionDelta {
    pub to_create: Vec<Position>,
    pub to_update: Vec<Position>,
    pub to_delete: Vec<PositionKey>,
}

impl PositionDelta {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// spec.md §4.4 `reconciled{created, updated, deleted, timestamp}`.
#[derive(Debug, Clone)]
pub struct PositionReconciled {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub timestamp: DateTime<Utc>,
}
