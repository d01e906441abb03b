//! Rate-limit cache domain (spec.md §4.7).

mod cache;
mod types;

pub use cache::RateLimitCache;
pub use types::{
    Client, Interval, RateLimitEntry, RateLimitKey, RateLimitRecord, RateLimitSnapshot, RateLimitSummaryEntry,
    RateLimitType, Source, UsageSnapshot,
};
