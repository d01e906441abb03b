//! Order cache domain (spec.md §4.5).

mod cache;
mod comparator;
mod types;
mod updater;

pub use cache::OrderCache;
pub use comparator::OrderDeltaComparator;
pub use types::{
    AlgoOrderKey, AlgoOrderStatus, AlgoOrderUpdate, CacheAction, CacheDecision, ExecutionType, OrderDelta, OrderKey,
    OrderStats, OrderStatus, OrderType, OrderUpdate, Side,
};
pub use updater::{OrderCacheUpdater, OrderEvent};
