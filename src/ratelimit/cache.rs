//! Rate-limit cache (spec.md §4.7).

use super::types::{
    Client, Interval, RateLimitEntry, RateLimitKey, RateLimitRecord, RateLimitSnapshot, RateLimitSummaryEntry, RateLimitType,
    Source, UsageSnapshot,
};
use crate::config::{CacheConfig, SetOptions};
use crate::domain::DomainCache;
use crate::instance::InstanceKey;
use crate::substrate::ConcurrentCache;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct RateLimitCache {
    entries: Arc<ConcurrentCache<RateLimitKey, RateLimitEntry>>,
}

impl RateLimitCache {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            entries: ConcurrentCache::new(CacheConfig::named(name)),
        })
    }

    /// spec.md §4.7 `update`: `source = websocket` when `client` is `userdata`, else `client`.
    pub fn update(&self, instance: InstanceKey, client: Client, rate_limits: Vec<RateLimitRecord>) {
        let source = match client {
            Client::Userdata | Client::Websocket => Source::Websocket,
            Client::Rest => Source::Rest,
        };
        let key = RateLimitKey { instance, client };
        self.entries.set(
            key,
            RateLimitEntry {
                rate_limits,
                last_updated: Utc::now(),
                source,
            },
            SetOptions::default(),
        );
    }

    /// spec.md §4.7 `getSummary`.
    pub fn get_summary(&self, instance: &InstanceKey, client: Client) -> Vec<RateLimitSummaryEntry> {
        let key = RateLimitKey { instance: instance.clone(), client };
        let Some(entry) = self.entries.get(&key) else { return Vec::new() };
        let now = Utc::now();
        entry
            .rate_limits
            .iter()
            .map(|record| RateLimitSummaryEntry {
                rate_limit_type: record.rate_limit_type,
                interval: record.interval,
                interval_num: record.interval_num,
                count: record.count,
                limit: record.limit,
                remaining: record.limit as i64 - record.count as i64,
                reset_in_ms: ms_until_next_window_boundary(now, record.interval, record.interval_num),
            })
            .collect()
    }

    /// spec.md §4.7 `getRateLimits`: collapses all clients into one snapshot.
    pub fn get_rate_limits(&self, instance: &InstanceKey) -> RateLimitSnapshot {
        let mut snapshot = RateLimitSnapshot::default();
        for client in [Client::Rest, Client::Websocket, Client::Userdata] {
            let key = RateLimitKey { instance: instance.clone(), client };
            let Some(entry) = self.entries.get(&key) else { continue };
            for record in &entry.rate_limits {
                match record.rate_limit_type {
                    RateLimitType::RequestWeight => {
                        snapshot.request_weight = UsageSnapshot { used: record.count, limit: record.limit };
                    }
                    RateLimitType::Orders => {
                        snapshot.orders = UsageSnapshot { used: record.count, limit: record.limit };
                    }
                    RateLimitType::RawRequests => {}
                }
            }
        }
        snapshot
    }
}

impl DomainCache<RateLimitKey, RateLimitEntry> for RateLimitCache {
    fn substrate(&self) -> &Arc<ConcurrentCache<RateLimitKey, RateLimitEntry>> {
        &self.entries
    }
}

/// spec.md §4.7 `msUntilNextWindowBoundary`. "Local midnight" is treated as
/// UTC midnight — the core carries no timezone configuration (out of scope
/// per spec.md §1).
fn ms_until_next_window_boundary(now: DateTime<Utc>, interval: Interval, interval_num: u32) -> i64 {
    match interval {
        Interval::Second => window_remainder(now, interval_num as i64 * 1_000),
        Interval::Minute => window_remainder(now, interval_num as i64 * 60_000),
        Interval::Day => {
            let next_midnight = (now.date_naive() + chrono::Duration::days(1))
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always a valid time");
            let next_midnight_utc = DateTime::<Utc>::from_naive_utc_and_offset(next_midnight, Utc);
            (next_midnight_utc - now).num_milliseconds()
        }
    }
}

fn window_remainder(now: DateTime<Utc>, window_ms: i64) -> i64 {
    if window_ms <= 0 {
        return 0;
    }
    let now_ms = now.timestamp_millis();
    window_ms - now_ms.rem_euclid(window_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_rate_limits_defaults_when_absent() {
        let cache = RateLimitCache::new("ratelimits");
        let snapshot = cache.get_rate_limits(&InstanceKey::new("tenant-a"));
        assert_eq!(snapshot.request_weight.limit, 2400);
        assert_eq!(snapshot.orders.limit, 300);
    }

    #[test]
    fn get_summary_computes_remaining() {
        let cache = RateLimitCache::new("ratelimits");
        cache.update(
            InstanceKey::new("tenant-a"),
            Client::Rest,
            vec![RateLimitRecord {
                rate_limit_type: RateLimitType::RequestWeight,
                interval: Interval::Minute,
                interval_num: 1,
                count: 400,
                limit: 2400,
            }],
        );
        let summary = cache.get_summary(&InstanceKey::new("tenant-a"), Client::Rest);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].remaining, 2000);
        assert!(summary[0].reset_in_ms > 0 && summary[0].reset_in_ms <= 60_000);
    }

    #[test]
    fn userdata_client_sources_from_websocket() {
        let cache = RateLimitCache::new("ratelimits");
        cache.update(InstanceKey::new("tenant-a"), Client::Userdata, vec![]);
        let entry = cache
            .substrate()
            .get(&RateLimitKey { instance: InstanceKey::new("tenant-a"), client: Client::Userdata })
            .unwrap();
        assert_eq!(entry.source, Source::Websocket);
    }
}
