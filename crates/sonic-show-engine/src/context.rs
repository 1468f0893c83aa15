//! Shared engine state.
//!
//! One [`ShowContext`] is built at process start and handed by reference to
//! every request. It owns the store backend, the configuration and the two
//! compute-once caches (alias map and namespace roles); both caches are
//! filled on first use and then served read-only to all concurrent requests.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::ip_interfaces::{ConfigDbInterfaceSource, InterfaceSource};
use crate::naming::AliasMap;
use crate::query::QueryResolver;
use crate::store::{Store, StoreBackend};
use crate::topology::NamespaceRoleSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// Process-wide engine context.
pub struct ShowContext {
    resolver: QueryResolver,
    config: EngineConfig,
    interface_source: Arc<dyn InterfaceSource>,
    alias_map: OnceCell<Arc<AliasMap>>,
    namespace_roles: OnceCell<Arc<NamespaceRoleSet>>,
}

impl ShowContext {
    /// Creates a context over a backend.
    pub fn new(backend: Arc<dyn StoreBackend>, config: EngineConfig) -> Self {
        let resolver = QueryResolver::new(backend);
        let interface_source = Arc::new(ConfigDbInterfaceSource::new(resolver.clone()));
        Self {
            resolver,
            config,
            interface_source,
            alias_map: OnceCell::new(),
            namespace_roles: OnceCell::new(),
        }
    }

    /// Pre-seeds the alias map instead of reading CONFIG_DB.
    pub fn with_alias_map(mut self, aliases: AliasMap) -> Self {
        self.alias_map = OnceCell::new_with(Some(Arc::new(aliases)));
        self
    }

    /// Pre-seeds the namespace roles instead of discovering them.
    pub fn with_namespace_roles(mut self, roles: NamespaceRoleSet) -> Self {
        self.namespace_roles = OnceCell::new_with(Some(Arc::new(roles)));
        self
    }

    /// Replaces the per-namespace interface source.
    pub fn with_interface_source(mut self, source: Arc<dyn InterfaceSource>) -> Self {
        self.interface_source = source;
        self
    }

    /// Query resolver over the backend.
    pub fn resolver(&self) -> &QueryResolver {
        &self.resolver
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Key separator of a store.
    pub fn separator(&self, store: Store) -> &str {
        self.resolver.separator(store)
    }

    /// Location of the counter baseline.
    pub fn baseline_path(&self) -> &Path {
        &self.config.counters.baseline_cache_path
    }

    /// Longest sampling window a request may ask for.
    pub fn max_period(&self) -> Duration {
        self.config.max_period()
    }

    pub(crate) fn interface_source(&self) -> &dyn InterfaceSource {
        self.interface_source.as_ref()
    }

    /// Alias map, loaded from CONFIG_DB on first use.
    pub async fn alias_map(&self) -> Result<Arc<AliasMap>> {
        self.alias_map
            .get_or_try_init(|| async { AliasMap::load(&self.resolver).await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// Namespace roles, discovered on first use.
    pub async fn namespace_roles(&self) -> Result<Arc<NamespaceRoleSet>> {
        self.namespace_roles
            .get_or_try_init(|| async {
                let asic_count = self.config.topology.asic_count();
                info!("Discovering namespaces for {} ASIC(s)", asic_count);
                NamespaceRoleSet::discover(&self.resolver, asic_count)
                    .await
                    .map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn single_asic_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.topology.num_asics = Some(1);
        config
    }

    #[tokio::test]
    async fn test_alias_map_loaded_once() {
        let store = Arc::new(MemoryStore::new());
        store.hset_default(Store::Config, "PORT|Ethernet0", [("alias", "etp1")]);
        let ctx = ShowContext::new(store.clone(), single_asic_config());

        let first = ctx.alias_map().await.unwrap();
        let reads = store.read_count();
        let second = ctx.alias_map().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.read_count(), reads);
        assert_eq!(first.alias_of("Ethernet0"), Some("etp1"));
    }

    #[tokio::test]
    async fn test_overrides_skip_store() {
        let store = Arc::new(MemoryStore::new());
        let ctx = ShowContext::new(store.clone(), single_asic_config())
            .with_alias_map(AliasMap::from_pairs([("Ethernet0", "etp1")]))
            .with_namespace_roles(NamespaceRoleSet {
                frontend: vec!["asic0".to_string()],
                ..Default::default()
            });

        assert_eq!(ctx.alias_map().await.unwrap().len(), 1);
        assert_eq!(ctx.namespace_roles().await.unwrap().frontend, vec!["asic0"]);
        assert_eq!(store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_readers_share_one_value() {
        let store = Arc::new(MemoryStore::new());
        store.hset_default(Store::Config, "PORT|Ethernet0", [("alias", "etp1")]);
        let ctx = Arc::new(ShowContext::new(store, single_asic_config()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                tokio::spawn(async move { ctx.alias_map().await.unwrap() })
            })
            .collect();

        let mut maps = Vec::new();
        for handle in handles {
            maps.push(handle.await.unwrap());
        }
        assert!(maps.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
