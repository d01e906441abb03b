//! Position cache domain (spec.md §4.4).

mod cache;
mod comparator;
mod types;
mod updater;

pub use cache::{PositionCache, PositionCacheEvent};
pub use comparator::PositionDeltaComparator;
pub use types::{
    MarginType, Position, PositionDelta, PositionKey, PositionReconciled, PositionSide, PositionStateChange,
    PositionStats, PositionUpdateOutcome,
};
pub use updater::{PositionCacheUpdater, PositionEvent};
