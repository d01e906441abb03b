//! Account domain types (spec.md §3 `AccountBalance`).

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Per-asset balance fields.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub wallet_balance: f64,
    pub cross_wallet_balance: f64,
    pub available_balance: f64,
    pub unrealized_profit: f64,
    /// Marginal field (spec.md §3: "marginal fields") — cross-margin balance
    /// committed to open positions for this asset.
    pub margin_balance: f64,
}

impl AssetBalance {
    pub fn new(asset: impl Into<String>, wallet_balance: f64) -> Self {
        Self {
            asset: asset.into(),
            wallet_balance,
            cross_wallet_balance: wallet_balance,
            available_balance: wallet_balance,
            unrealized_profit: 0.0,
            margin_balance: wallet_balance,
        }
    }
}

/// A duplicated, allowed-to-be-stale view of one open position, carried
/// inside `AccountBalance.positions` (spec.md §3).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AccountPositionSnapshot {
    pub symbol: String,
    pub position_side: String,
    pub position_amt: f64,
    pub unrealized_profit: f64,
}

/// Aggregate totals across all assets (spec.md §3: "totals (sum of balances)").
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AccountTotals {
    pub total_wallet_balance: f64,
    pub total_unrealized_profit: f64,
    pub total_margin_balance: f64,
    pub total_available_balance: f64,
}

/// Full account snapshot for one tenant instance (spec.md §3 `AccountBalance`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AccountBalance {
    pub assets: HashMap<String, AssetBalance>,
    pub positions: Vec<AccountPositionSnapshot>,
    pub totals: AccountTotals,
    /// Sourced from the remote transaction time (spec.md §3).
    pub last_update: DateTime<Utc>,
}

impl AccountBalance {
    pub fn new(last_update: DateTime<Utc>) -> Self {
        Self {
            assets: HashMap::new(),
            positions: Vec::new(),
            totals: AccountTotals::default(),
            last_update,
        }
    }

    /// Recomputes `totals` as the sum across all assets.
    pub fn recompute_totals(&mut self) {
        let mut totals = AccountTotals::default();
        for asset in self.assets.values() {
            totals.total_wallet_balance += asset.wallet_balance;
            totals.total_unrealized_profit += asset.unrealized_profit;
            totals.total_margin_balance += asset.margin_balance;
            totals.total_available_balance += asset.available_balance;
        }
        self.totals = totals;
    }
}

/// A single per-asset delta carried by a WS user-data account event
/// (spec.md §6 "Account events carry a list of per-asset deltas").
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDelta {
    pub asset: String,
    pub wallet_balance: f64,
    pub cross_wallet_balance: Option<f64>,
}

/// Bookkeeping envelope stored per instance (spec.md §4.3 `AccountCacheEntry`).
#[derive(Debug, Clone)]
pub struct AccountCacheEntry {
    pub balance: AccountBalance,
    pub last_fetch: DateTime<Utc>,
    pub next_refresh: DateTime<Utc>,
    pub fetch_count: u64,
    pub errors: u32,
    pub transaction_time: Option<i64>,
}
