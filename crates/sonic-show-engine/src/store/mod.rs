//! Access to the SONiC key-value stores.
//!
//! The engine reads four independently updated databases. Each read is
//! addressed by a [`StoreTarget`] (database plus optional ASIC namespace) and
//! goes through a [`StoreBackend`], so the same resolver runs against redis in
//! production and against [`MemoryStore`] in tests.

mod memory;
mod redis_adapter;

pub use self::memory::MemoryStore;
pub use self::redis_adapter::RedisStore;

use crate::error::{Result, ShowError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// SONiC database identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Store {
    /// CONFIG_DB - switch configuration.
    Config,
    /// STATE_DB - live forwarding and transceiver state.
    State,
    /// COUNTERS_DB - hardware counters and rates.
    Counters,
    /// APPL_DB - application state published for orchagent.
    Appl,
}

impl Store {
    /// All stores, in a stable order.
    pub const ALL: [Store; 4] = [Store::Config, Store::State, Store::Counters, Store::Appl];

    /// Returns the database name as used in Redis/SONiC.
    pub fn db_name(&self) -> &'static str {
        match self {
            Store::Config => "CONFIG_DB",
            Store::State => "STATE_DB",
            Store::Counters => "COUNTERS_DB",
            Store::Appl => "APPL_DB",
        }
    }

    /// Returns the default redis database number.
    pub fn default_db_number(&self) -> u32 {
        match self {
            Store::Appl => 0,
            Store::Counters => 2,
            Store::Config => 4,
            Store::State => 6,
        }
    }

    /// Returns the default table/key separator.
    pub fn default_separator(&self) -> &'static str {
        match self {
            Store::Config | Store::State => "|",
            Store::Counters | Store::Appl => ":",
        }
    }

    /// Parses a database name; both `COUNTERS_DB` and `COUNTERS` are accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_suffix("_DB").unwrap_or(name);
        match name {
            "CONFIG" => Some(Store::Config),
            "STATE" => Some(Store::State),
            "COUNTERS" => Some(Store::Counters),
            "APPL" => Some(Store::Appl),
            _ => None,
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.db_name())
    }
}

/// A database in a given ASIC namespace. The empty namespace is the default one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreTarget {
    /// Database
    pub store: Store,
    /// ASIC namespace ("" for the default namespace)
    pub namespace: String,
}

impl StoreTarget {
    /// Creates a target.
    pub fn new(store: Store, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Creates a target in the default namespace.
    pub fn default_ns(store: Store) -> Self {
        Self::new(store, "")
    }

    /// Parses `"<DB>[/<namespace>]"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, namespace) = match spec.split_once('/') {
            Some((name, namespace)) => (name, namespace),
            None => (spec, ""),
        };
        let store = Store::from_name(name)
            .ok_or_else(|| ShowError::invalid(format!("unknown database '{}'", name)))?;
        if namespace.contains('/') {
            return Err(ShowError::invalid(format!(
                "invalid namespace in target '{}'",
                spec
            )));
        }
        Ok(Self::new(store, namespace))
    }
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.store)
        } else {
            write!(f, "{}/{}", self.store, self.namespace)
        }
    }
}

/// Read-only access to the key-value stores.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Returns every key matching a glob pattern (`*` wildcards).
    async fn keys(&self, target: &StoreTarget, pattern: &str) -> Result<Vec<String>>;

    /// Returns all fields of a hash; an absent key yields an empty map.
    async fn hgetall(&self, target: &StoreTarget, key: &str) -> Result<HashMap<String, String>>;

    /// Returns the table/key separator used by a store.
    fn separator(&self, store: Store) -> &str {
        store.default_separator()
    }
}

/// Glob match supporting `*` only, which is all SONiC key patterns use.
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return candidate.is_empty();
    };
    let Some(mut rest) = candidate.strip_prefix(first) else {
        return false;
    };
    let mut parts: Vec<&str> = parts.collect();
    let Some(last) = parts.pop() else {
        // No wildcard at all
        return rest.is_empty();
    };
    for part in parts {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
