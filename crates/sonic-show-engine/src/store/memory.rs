//! In-memory store backend.
//!
//! Holds hashes per [`StoreTarget`] and answers the same `keys`/`hgetall`
//! calls the redis backend does. Used by tests, demos and anything that wants
//! to replay a captured database dump.

use super::{glob_match, Store, StoreBackend, StoreTarget};
use crate::error::{Result, ShowError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Hashes = BTreeMap<String, HashMap<String, String>>;

/// In-memory database set with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<StoreTarget, Hashes>>,
    failing_namespaces: RwLock<HashSet<String>>,
    failing_targets: RwLock<HashSet<StoreTarget>>,
    reads: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets hash fields under `key` in `target`, creating the hash if needed.
    pub fn hset<K, V>(&self, target: &StoreTarget, key: &str, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut data = self.write_data();
        let entry = data
            .entry(target.clone())
            .or_default()
            .entry(key.to_string())
            .or_default();
        for (field, value) in fields {
            entry.insert(field.into(), value.into());
        }
    }

    /// Sets hash fields in the default namespace of `store`.
    pub fn hset_default<K, V>(&self, store: Store, key: &str, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.hset(&StoreTarget::default_ns(store), key, fields);
    }

    /// Removes a key.
    pub fn delete(&self, target: &StoreTarget, key: &str) {
        if let Some(hashes) = self.write_data().get_mut(target) {
            hashes.remove(key);
        }
    }

    /// Makes every read in `namespace` fail.
    pub fn fail_namespace(&self, namespace: &str) {
        self.failing_namespaces
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(namespace.to_string());
    }

    /// Makes every read of one target fail.
    pub fn fail_target(&self, target: &StoreTarget) {
        self.failing_targets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(target.clone());
    }

    /// Number of `keys`/`hgetall` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn read_data(&self) -> RwLockReadGuard<'_, HashMap<StoreTarget, Hashes>> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_data(&self) -> RwLockWriteGuard<'_, HashMap<StoreTarget, Hashes>> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self, target: &StoreTarget) -> Result<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let namespace_down = self
            .failing_namespaces
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&target.namespace);
        let target_down = self
            .failing_targets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(target);
        if namespace_down || target_down {
            return Err(ShowError::database(target.to_string(), "store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn keys(&self, target: &StoreTarget, pattern: &str) -> Result<Vec<String>> {
        self.check_available(target)?;
        let data = self.read_data();
        Ok(data
            .get(target)
            .map(|hashes| {
                hashes
                    .keys()
                    .filter(|key| glob_match(pattern, key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hgetall(&self, target: &StoreTarget, key: &str) -> Result<HashMap<String, String>> {
        self.check_available(target)?;
        let data = self.read_data();
        Ok(data
            .get(target)
            .and_then(|hashes| hashes.get(key))
            .cloned()
            .unwrap_or_default())
    }
}
