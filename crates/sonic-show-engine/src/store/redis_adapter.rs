//! Redis store backend
//!
//! Production backend for the SWSS databases. One connection manager is
//! created lazily per (database, namespace) pair and shared by every request
//! afterwards; each namespace maps to its own redis endpoint on multi-ASIC
//! platforms. Connecting to one target never waits on another, so an
//! unreachable ASIC only delays requests that read from it.

use super::{Store, StoreBackend, StoreTarget};
use crate::config::DatabaseConfig;
use crate::error::{Result, ShowError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Lazily established connections, one slot per target.
///
/// The map lock only guards slot lookup. Connecting happens on the target's
/// own slot, so concurrent callers for the same target share one attempt and
/// callers for other targets are not held up. A failed attempt leaves the
/// slot empty and the next caller retries.
#[derive(Debug)]
struct ConnectionSlots<C> {
    slots: Mutex<HashMap<StoreTarget, Arc<OnceCell<C>>>>,
}

impl<C: Clone> ConnectionSlots<C> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn get_or_connect<F, Fut>(&self, target: &StoreTarget, connect: F) -> Result<C>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(target.clone()).or_default())
        };
        slot.get_or_try_init(connect).await.cloned()
    }
}

/// Redis-backed store access.
pub struct RedisStore {
    config: DatabaseConfig,
    connect_timeout: Duration,
    connections: ConnectionSlots<ConnectionManager>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("host", &self.config.redis_host)
            .field("port", &self.config.redis_port)
            .field("namespaces", &self.config.namespaces.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RedisStore {
    /// Creates a store; no connection is opened until the first read.
    pub fn new(config: DatabaseConfig) -> Self {
        let connect_timeout = config.connection_timeout();
        Self {
            config,
            connect_timeout,
            connections: ConnectionSlots::new(),
        }
    }

    /// Returns the redis URI for a target.
    pub fn uri(&self, target: &StoreTarget) -> Result<String> {
        let endpoint = self.config.endpoint(&target.namespace).ok_or_else(|| {
            ShowError::database(
                target.to_string(),
                format!("no endpoint configured for namespace '{}'", target.namespace),
            )
        })?;
        Ok(format!(
            "redis://{}:{}/{}",
            endpoint.host,
            endpoint.port,
            self.config.db_number(target.store)
        ))
    }

    async fn connection(&self, target: &StoreTarget) -> Result<ConnectionManager> {
        self.connections
            .get_or_connect(target, || self.connect(target))
            .await
    }

    async fn connect(&self, target: &StoreTarget) -> Result<ConnectionManager> {
        let uri = self.uri(target)?;
        let client = redis::Client::open(uri.as_str()).map_err(|e| {
            ShowError::database(target.to_string(), format!("Failed to create Redis client: {}", e))
        })?;
        let manager = tokio::time::timeout(self.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                warn!("Connecting to {} ({}) timed out", target, uri);
                ShowError::database(target.to_string(), "connection timed out")
            })?
            .map_err(|e| {
                ShowError::database(target.to_string(), format!("Failed to connect to Redis: {}", e))
            })?;

        info!("Connected to Redis for {} ({})", target, uri);
        Ok(manager)
    }
}

#[async_trait]
impl StoreBackend for RedisStore {
    async fn keys(&self, target: &StoreTarget, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection(target).await?;
        debug!("KEYS {} on {}", pattern, target);
        conn.keys(pattern)
            .await
            .map_err(|e| ShowError::database(target.to_string(), format!("KEYS failed: {}", e)))
    }

    async fn hgetall(&self, target: &StoreTarget, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection(target).await?;
        conn.hgetall(key)
            .await
            .map_err(|e| ShowError::database(target.to_string(), format!("HGETALL failed: {}", e)))
    }

    fn separator(&self, store: Store) -> &str {
        self.config.separator(store)
    }
}
