//! Crate-wide error type.
//!
//! The core never panics on caller input and never surfaces an error across a
//! public *read* API (reads encode failure in [`crate::result::ReadResult`]
//! instead, per spec). `CacheError` exists for the narrower set of cases
//! where a `Result` is the right shape: disposed-component misuse, single-
//! flight factory failures, and event-manager registration limits.

use std::sync::Arc;

/// Errors surfaced by the cache core's non-read APIs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// A resource-acquisition call (`get_or_add`, `get_or_add_async`,
    /// `add_or_update`) was made after
    /// [`dispose`](crate::substrate::ConcurrentCache::dispose) (spec.md §7
    /// "Disposal after use"). Plain `set`/`remove`/`get` on a disposed cache
    /// are not covered by this variant — per spec.md §7 "writes have no
    /// return value", a disposed cache's store is simply empty after
    /// `dispose()` clears it, and those calls behave exactly as they would
    /// against any other empty cache.
    #[error("component '{0}' has been disposed")]
    Disposed(Arc<str>),

    /// A `get_or_add_async` factory failed; this is cloned to every waiter
    /// joined on the same in-flight key.
    #[error("factory failed: {0}")]
    FactoryFailed(Arc<str>),

    /// §4.8: at most 100 handlers may be registered per event name.
    #[error("event '{event}' already has the maximum of {max} handlers registered")]
    EventHandlerCapacityExceeded { event: Arc<str>, max: usize },

    /// §4.8: handler ids must be unique within an event name.
    #[error("handler id '{0}' is already registered")]
    DuplicateHandlerId(Arc<str>),
}

pub type CacheResult<T> = Result<T, CacheError>;
