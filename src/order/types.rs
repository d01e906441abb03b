//! Order domain types (spec.md §3 `OrderUpdate`, `AlgoOrderUpdate`).

use crate::instance::InstanceKey;
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopMarket,
    TakeProfit,
    TakeProfitMarket,
    TrailingStopMarket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExecutionType {
    New,
    Trade,
    Canceled,
    Expired,
    Amendment,
    Calculated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    ExpiredInMatch,
}

impl OrderStatus {
    /// spec.md §3: `isActive ≡ orderStatus ∈ {NEW, PARTIALLY_FILLED}`.
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    /// spec.md §3: `isTerminal ≡ orderStatus ∈ {FILLED, CANCELED, EXPIRED, EXPIRED_IN_MATCH}`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Expired | OrderStatus::ExpiredInMatch
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AlgoOrderStatus {
    New,
    Triggering,
    Triggered,
    Finished,
    Executed,
    Rejected,
    Cancelled,
    Expired,
}

impl AlgoOrderStatus {
    /// spec.md §3: active set `{NEW, TRIGGERING, TRIGGERED}`.
    pub fn is_active(self) -> bool {
        matches!(self, AlgoOrderStatus::New | AlgoOrderStatus::Triggering | AlgoOrderStatus::Triggered)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

/// Composite key `(instanceKey, orderId)` — typed struct, not a delimited
/// string (spec.md §9 "Composite keys").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub instance: InstanceKey,
    pub order_id: i64,
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.instance, self.order_id)
    }
}

/// Composite key `(instanceKey, algoId)` — distinct keyspace from [`OrderKey`]
/// (spec.md §3: "Algo and regular orders are stored in distinct keyspaces").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlgoOrderKey {
    pub instance: InstanceKey,
    pub algo_id: i64,
}

impl fmt::Display for AlgoOrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.instance, self.algo_id)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OrderUpdate {
    pub instance: InstanceKey,
    pub order_id: i64,
    pub symbol: SmolStr,
    pub side: Side,
    pub order_type: OrderType,
    pub original_quantity: f64,
    pub filled_quantity: f64,
    pub original_price: f64,
    pub average_price: f64,
    pub stop_price: f64,
    pub execution_type: ExecutionType,
    pub order_status: OrderStatus,
    pub event_time: i64,
    pub transaction_time: i64,
    pub trade_time: Option<i64>,
}

impl OrderUpdate {
    pub fn key(&self) -> OrderKey {
        OrderKey {
            instance: self.instance.clone(),
            order_id: self.order_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AlgoOrderUpdate {
    pub instance: InstanceKey,
    pub algo_id: i64,
    pub client_algo_id: SmolStr,
    pub symbol: SmolStr,
    pub side: Side,
    pub order_type: OrderType,
    pub status: AlgoOrderStatus,
    /// Populated once the algo fires and a child live order is placed.
    pub order_id: Option<i64>,
    pub event_time: i64,
    pub transaction_time: i64,
}

impl AlgoOrderUpdate {
    pub fn key(&self) -> AlgoOrderKey {
        AlgoOrderKey {
            instance: self.instance.clone(),
            algo_id: self.algo_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct OrderStats {
    pub total: usize,
    pub active: usize,
    pub terminal: usize,
}

/// spec.md §4.5 `OrderDeltaComparator.compare` output.
#[derive(Debug, Clone, Default)]
pub struct OrderDelta {
    pub to_create: Vec<OrderUpdate>,
    pub to_update: Vec<OrderUpdate>,
    pub to_delete: Vec<OrderUpdate>,
}

/// spec.md §4.5 `shouldUpdateCache(ws, cached?) -> {action, reason}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    Create,
    Update,
    Delete,
    Ignore,
}

#[derive(Debug, Clone)]
pub struct CacheDecision {
    pub action: CacheAction,
    pub reason: &'static str,
}
