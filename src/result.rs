//! Uniform read-result envelope used by every domain cache's lock-free query
//! methods (spec.md §4.5, §4.3, §7).
//!
//! Reads never fail with a `Result::Err`; missing data is encoded as
//! `success = false` with a human-readable `error`.

use chrono::{DateTime, Utc};

/// Result envelope returned by lock-free domain-cache reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub latency_ms: f64,
    pub timestamp: DateTime<Utc>,
    /// Age of the underlying data at read time, when applicable (§4.3 `getBalance`).
    pub stale_ms: Option<i64>,
}

impl<T> ReadResult<T> {
    pub fn ok(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: Utc::now(),
            stale_ms: None,
        }
    }

    pub fn ok_with_staleness(data: T, latency_ms: f64, stale_ms: i64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: Utc::now(),
            stale_ms: Some(stale_ms),
        }
    }

    pub fn missing(error: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            latency_ms,
            timestamp: Utc::now(),
            stale_ms: None,
        }
    }
}
