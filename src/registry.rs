//! Cache registry: the library's composition root (spec.md §2, §6 lifecycle).
//!
//! `AccountCache`, `OrderCache`, `SymbolInfoCache` and `RateLimitCache` key
//! `instanceKey` into their own entries and are shared process-wide.
//! `PositionCache` does not (its key is `"{symbol}|{positionSide}"`,
//! spec.md §4.4), so one `PositionCache` + `PositionCacheUpdater` pair is
//! constructed per registered instance. A host holds one `CacheRegistry` and
//! calls `dispose()` once at shutdown; there is no global singleton
//! (spec.md §6: "A host composing the core holds references and calls
//! dispose in reverse construction order").

use crate::account::{AccountCache, AccountCacheUpdater};
use crate::config::{AccountCacheConfig, CacheConfig, OrderCacheConfig};
use crate::domain::DomainCache;
use crate::instance::InstanceKey;
use crate::order::{OrderCache, OrderCacheUpdater};
use crate::position::{PositionCache, PositionCacheUpdater};
use crate::ratelimit::RateLimitCache;
use crate::symbol::SymbolInfoCache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub account: AccountCacheConfig,
    pub order: OrderCacheConfig,
    pub position: CacheConfig,
    pub symbol: CacheConfig,
    pub rate_limit: CacheConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            account: AccountCacheConfig::default(),
            order: OrderCacheConfig::default(),
            position: CacheConfig::named("positions"),
            symbol: CacheConfig::named("symbols"),
            rate_limit: CacheConfig::named("rate-limits"),
        }
    }
}

struct InstanceCaches {
    account_updater: Arc<AccountCacheUpdater>,
    position_cache: Arc<PositionCache>,
    position_updater: Arc<PositionCacheUpdater>,
}

/// Owns every domain cache and wires per-instance updaters on demand.
pub struct CacheRegistry {
    config: RegistryConfig,
    account_cache: Arc<AccountCache>,
    order_cache: Arc<OrderCache>,
    order_updater: Arc<OrderCacheUpdater>,
    symbol_cache: Arc<SymbolInfoCache>,
    rate_limit_cache: Arc<RateLimitCache>,
    instances: RwLock<HashMap<InstanceKey, InstanceCaches>>,
}

impl CacheRegistry {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        let account_cache = AccountCache::new(config.account.clone());
        let order_cache = OrderCache::new(config.order.clone());
        let order_updater = Arc::new(OrderCacheUpdater::new(order_cache.clone()));
        let symbol_cache = SymbolInfoCache::new(config.symbol.name.clone());
        let rate_limit_cache = RateLimitCache::new(config.rate_limit.name.clone());

        Arc::new(Self {
            config,
            account_cache,
            order_cache,
            order_updater,
            symbol_cache,
            rate_limit_cache,
            instances: RwLock::new(HashMap::new()),
        })
    }

    pub fn account_cache(&self) -> &Arc<AccountCache> {
        &self.account_cache
    }

    pub fn order_cache(&self) -> &Arc<OrderCache> {
        &self.order_cache
    }

    pub fn order_updater(&self) -> &Arc<OrderCacheUpdater> {
        &self.order_updater
    }

    pub fn symbol_cache(&self) -> &Arc<SymbolInfoCache> {
        &self.symbol_cache
    }

    pub fn rate_limit_cache(&self) -> &Arc<RateLimitCache> {
        &self.rate_limit_cache
    }

    /// Lazily constructs (or returns) the per-instance `AccountCacheUpdater`
    /// and `PositionCache`/`PositionCacheUpdater` pair for `instance`.
    pub fn register_instance(&self, instance: InstanceKey) {
        let mut instances = self.instances.write();
        instances.entry(instance.clone()).or_insert_with(|| {
            let position_cache = PositionCache::new(self.config.position.clone());
            InstanceCaches {
                account_updater: Arc::new(AccountCacheUpdater::new(self.account_cache.clone(), instance)),
                position_updater: Arc::new(PositionCacheUpdater::new(position_cache.clone())),
                position_cache,
            }
        });
    }

    pub fn account_updater(&self, instance: &InstanceKey) -> Option<Arc<AccountCacheUpdater>> {
        self.instances.read().get(instance).map(|c| c.account_updater.clone())
    }

    pub fn position_cache(&self, instance: &InstanceKey) -> Option<Arc<PositionCache>> {
        self.instances.read().get(instance).map(|c| c.position_cache.clone())
    }

    pub fn position_updater(&self, instance: &InstanceKey) -> Option<Arc<PositionCacheUpdater>> {
        self.instances.read().get(instance).map(|c| c.position_updater.clone())
    }

    /// spec.md §6: dispose in reverse construction order. Per-instance
    /// position caches are disposed first (they were constructed last, on
    /// demand), then the shared caches in reverse of their construction
    /// order in [`Self::new`].
    pub fn dispose(&self) {
        for (_, caches) in self.instances.write().drain() {
            caches.position_cache.dispose();
        }
        self.rate_limit_cache.dispose();
        self.symbol_cache.dispose();
        self.order_cache.dispose();
        self.account_cache.dispose();
    }
}
