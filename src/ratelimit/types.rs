//! Rate-limit domain types (spec.md §3 `RateLimitStatus`).

use crate::instance::InstanceKey;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Client {
    Rest,
    Websocket,
    Userdata,
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Client::Rest => "rest",
            Client::Websocket => "websocket",
            Client::Userdata => "userdata",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RateLimitType {
    RequestWeight,
    Orders,
    RawRequests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Interval {
    Second,
    Minute,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RateLimitRecord {
    pub rate_limit_type: RateLimitType,
    pub interval: Interval,
    pub interval_num: u32,
    pub count: u32,
    pub limit: u32,
}

/// Composite key `(instanceKey, client)` — typed struct (spec.md §9).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub instance: InstanceKey,
    pub client: Client,
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.instance, self.client)
    }
}

/// "source = websocket when client is userdata else equals client" (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Source {
    Rest,
    Websocket,
}

#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    pub rate_limits: Vec<RateLimitRecord>,
    pub last_updated: DateTime<Utc>,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RateLimitSummaryEntry {
    pub rate_limit_type: RateLimitType,
    pub interval: Interval,
    pub interval_num: u32,
    pub count: u32,
    pub limit: u32,
    pub remaining: i64,
    pub reset_in_ms: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UsageSnapshot {
    pub used: u32,
    pub limit: u32,
}

/// spec.md §4.7 `getRateLimits(instanceKey)` collapsed snapshot.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct RateLimitSnapshot {
    pub request_weight: UsageSnapshot,
    pub orders: UsageSnapshot,
}

impl Default for RateLimitSnapshot {
    fn default() -> Self {
        Self {
            request_weight: UsageSnapshot { used: 0, limit: 2400 },
            orders: UsageSnapshot { used: 0, limit: 300 },
        }
    }
}
