//! Abstract query resolution.
//!
//! Callers address data as `[store, table, key1?, key2?, field?]` and get back
//! one merged map of row key to row. The resolver validates each tuple, builds
//! the store key pattern, and translates name-addressed counter paths
//! (`COUNTERS/Ethernet*`, `COUNTERS/Ethernet0/Queues`) through the object-id
//! name maps kept in COUNTERS_DB.
//!
//! Row keys are relative to the table for whole-table and wildcard queries
//! (`Ethernet0`, `Vlan100|Ethernet0`) and carry the table for a concrete key
//! (`DEVICE_METADATA|localhost`).

use crate::error::{Result, ShowError};
use crate::store::{glob_match, Store, StoreBackend, StoreTarget};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Fields of one row.
pub type Row = serde_json::Map<String, Value>;

/// Merged query result: row key to row (or to a plain value for name maps).
pub type DataMap = serde_json::Map<String, Value>;

const MIN_QUERY_LEN: usize = 2;
const MAX_QUERY_LEN: usize = 5;

/// COUNTERS_DB tables addressed by port name instead of object id.
const PORT_VIRTUAL_TABLES: [&str; 2] = ["COUNTERS", "RATES"];
const PORT_NAME_MAP: &str = "COUNTERS_PORT_NAME_MAP";
const QUEUE_NAME_MAP: &str = "COUNTERS_QUEUE_NAME_MAP";
const QUEUES_KEY: &str = "Queues";

/// One validated query tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    target: StoreTarget,
    table: String,
    /// Everything after the table: up to two keys and an optional field.
    rest: Vec<String>,
}

impl Query {
    /// Validates a `[store, table, key1?, key2?, field?]` tuple.
    pub fn new<I, S>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        if parts.len() < MIN_QUERY_LEN || parts.len() > MAX_QUERY_LEN {
            return Err(ShowError::invalid(format!(
                "invalid query {:?}: must support at least [DB, table] or at most [DB, table, key1, key2, field]",
                parts
            )));
        }
        if parts.iter().any(String::is_empty) {
            return Err(ShowError::invalid(format!(
                "invalid query {:?}: empty path element",
                parts
            )));
        }
        let target = StoreTarget::parse(&parts[0])?;
        Ok(Self {
            target,
            table: parts[1].clone(),
            rest: parts[2..].to_vec(),
        })
    }

    /// Builds a query against an explicit target.
    pub fn for_target(target: &StoreTarget, table: &str, rest: &[&str]) -> Result<Self> {
        let mut parts = vec![target.to_string(), table.to_string()];
        parts.extend(rest.iter().map(|s| s.to_string()));
        Self::new(parts)
    }

    /// Store target addressed by this query.
    pub fn target(&self) -> &StoreTarget {
        &self.target
    }

    /// Table addressed by this query.
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}", self.target, self.table)?;
        for part in &self.rest {
            write!(f, ", {}", part)?;
        }
        f.write_str("]")
    }
}

/// Resolves queries against a store backend.
#[derive(Clone)]
pub struct QueryResolver {
    backend: Arc<dyn StoreBackend>,
}

impl QueryResolver {
    /// Creates a resolver over a backend.
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Key separator of a store.
    pub fn separator(&self, store: Store) -> &str {
        self.backend.separator(store)
    }

    /// Resolves every query and merges the rows; later queries overwrite
    /// earlier ones on key collision. Any failing query fails the call.
    pub async fn resolve(&self, queries: &[Query]) -> Result<DataMap> {
        let mut merged = DataMap::new();
        for query in queries {
            debug!("Resolving query {}", query);
            let rows = self.resolve_one(query).await.map_err(|e| match e {
                ShowError::InvalidArgument(msg) => {
                    ShowError::InvalidArgument(format!("query {} failed: {}", query, msg))
                }
                other => other,
            })?;
            merged.extend(rows);
        }
        Ok(merged)
    }

    /// Parses and resolves raw tuples in one step.
    pub async fn resolve_raw(&self, queries: &[&[&str]]) -> Result<DataMap> {
        let parsed = queries
            .iter()
            .map(|q| Query::new(q.iter().copied()))
            .collect::<Result<Vec<_>>>()?;
        self.resolve(&parsed).await
    }

    async fn resolve_one(&self, query: &Query) -> Result<DataMap> {
        let is_virtual = query.target.store == Store::Counters
            && PORT_VIRTUAL_TABLES.contains(&query.table.as_str())
            && query
                .rest
                .first()
                .is_some_and(|key| !key.starts_with("oid:"));
        if is_virtual {
            if query.table == "COUNTERS" && query.rest.get(1).map(String::as_str) == Some(QUEUES_KEY) {
                return self.resolve_queue_counters(query).await;
            }
            return self.resolve_port_counters(query).await;
        }

        let sep = self.backend.separator(query.target.store).to_string();
        match query.rest.as_slice() {
            [] => self.read_table(&query.target, &query.table, &sep).await,
            [key] => self.read_keyed(query, &[key.as_str()], None, &sep).await,
            [key1, second] => {
                // [table, key1, key2] when such a row exists, else [table, key1, field]
                let two_keys = format!("{}{}{}{}{}", query.table, sep, key1, sep, second);
                let is_row = self
                    .backend
                    .keys(&query.target, &two_keys)
                    .await?
                    .into_iter()
                    .next()
                    .is_some();
                if is_row || second.contains('*') {
                    self.read_keyed(query, &[key1.as_str(), second.as_str()], None, &sep)
                        .await
                } else {
                    self.read_keyed(query, &[key1.as_str()], Some(second.as_str()), &sep)
                        .await
                }
            }
            [key1, key2, field] => {
                self.read_keyed(
                    query,
                    &[key1.as_str(), key2.as_str()],
                    Some(field.as_str()),
                    &sep,
                )
                .await
            }
            _ => Err(ShowError::invalid(format!("invalid query {}", query))),
        }
    }

    /// Whole table; falls back to a single hash named after the table.
    async fn read_table(&self, target: &StoreTarget, table: &str, sep: &str) -> Result<DataMap> {
        let prefix = format!("{}{}", table, sep);
        let keys = self.backend.keys(target, &format!("{}*", prefix)).await?;

        let mut rows = DataMap::new();
        for key in keys {
            let fields = self.backend.hgetall(target, &key).await?;
            let row_key = key.strip_prefix(&prefix).unwrap_or(&key).to_string();
            rows.insert(row_key, Value::Object(to_row(fields)));
        }

        if rows.is_empty() {
            let flat = self.backend.hgetall(target, table).await?;
            for (field, value) in flat {
                rows.insert(field, Value::String(value));
            }
        }
        debug!("Read {} entries from {} {}", rows.len(), target, table);
        Ok(rows)
    }

    async fn read_keyed(
        &self,
        query: &Query,
        keys: &[&str],
        field: Option<&str>,
        sep: &str,
    ) -> Result<DataMap> {
        let prefix = format!("{}{}", query.table, sep);
        let full_key = format!("{}{}", prefix, keys.join(sep));
        let wildcard = full_key.contains('*');

        let store_keys = if wildcard {
            self.backend.keys(&query.target, &full_key).await?
        } else {
            vec![full_key.clone()]
        };

        let mut rows = DataMap::new();
        for key in store_keys {
            let fields = self.backend.hgetall(&query.target, &key).await?;
            if fields.is_empty() {
                if wildcard {
                    continue;
                }
                return Err(ShowError::NotFound(format!("{} in {}", key, query.target)));
            }
            let row = restrict(fields, field).ok_or_else(|| {
                ShowError::NotFound(format!(
                    "field {} of {} in {}",
                    field.unwrap_or_default(),
                    key,
                    query.target
                ))
            })?;
            let row_key = if wildcard {
                key.strip_prefix(&prefix).unwrap_or(&key).to_string()
            } else {
                key
            };
            rows.insert(row_key, Value::Object(row));
        }
        Ok(rows)
    }

    async fn resolve_port_counters(&self, query: &Query) -> Result<DataMap> {
        let port_pattern = &query.rest[0];
        let field = query.rest.get(1).map(String::as_str);
        let name_map = self.backend.hgetall(&query.target, PORT_NAME_MAP).await?;
        let sep = self.backend.separator(Store::Counters).to_string();

        let mut names: Vec<&String> = name_map
            .keys()
            .filter(|name| glob_match(port_pattern, name))
            .collect();
        if names.is_empty() && !port_pattern.contains('*') {
            return Err(ShowError::NotFound(format!(
                "{} not found in {}",
                port_pattern, PORT_NAME_MAP
            )));
        }
        names.sort();

        let mut rows = DataMap::new();
        for name in names {
            let oid = &name_map[name];
            let key = format!("{}{}{}", query.table, sep, oid);
            let fields = self.backend.hgetall(&query.target, &key).await?;
            if fields.is_empty() {
                continue;
            }
            if let Some(row) = restrict(fields, field) {
                rows.insert(name.clone(), Value::Object(row));
            }
        }
        Ok(rows)
    }

    async fn resolve_queue_counters(&self, query: &Query) -> Result<DataMap> {
        let port_pattern = &query.rest[0];
        let field = query.rest.get(2).map(String::as_str);
        let name_map = self.backend.hgetall(&query.target, QUEUE_NAME_MAP).await?;
        let sep = self.backend.separator(Store::Counters).to_string();

        let mut rows = DataMap::new();
        for (queue_name, oid) in &name_map {
            let port = queue_name.split(sep.as_str()).next().unwrap_or_default();
            if !glob_match(port_pattern, port) {
                continue;
            }
            let key = format!("{}{}{}", query.table, sep, oid);
            let fields = self.backend.hgetall(&query.target, &key).await?;
            if fields.is_empty() {
                continue;
            }
            if let Some(row) = restrict(fields, field) {
                rows.insert(queue_name.clone(), Value::Object(row));
            }
        }
        if rows.is_empty() && !port_pattern.contains('*') {
            return Err(ShowError::NotFound(format!(
                "no queue counters for {}",
                port_pattern
            )));
        }
        Ok(rows)
    }
}

fn to_row(fields: HashMap<String, String>) -> Row {
    fields
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect()
}

fn restrict(fields: HashMap<String, String>, field: Option<&str>) -> Option<Row> {
    match field {
        None => Some(to_row(fields)),
        Some(field) => {
            let value = fields.get(field)?;
            let mut row = Row::new();
            row.insert(field.to_string(), Value::String(value.clone()));
            Some(row)
        }
    }
}

/// String form of `data[key][field]`, if present.
pub fn field_value(data: &DataMap, key: &str, field: &str) -> Option<String> {
    let value = data.get(key)?.as_object()?.get(field)?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// String form of `data[key][field]`, or `default`.
pub fn field_value_or(data: &DataMap, key: &str, field: &str, default: &str) -> String {
    field_value(data, key, field).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn resolver_with(store: MemoryStore) -> QueryResolver {
        QueryResolver::new(Arc::new(store))
    }

    fn counters_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.hset_default(
            Store::Counters,
            PORT_NAME_MAP,
            [("Ethernet0", "oid:0x1000"), ("Ethernet4", "oid:0x1004")],
        );
        store.hset_default(Store::Counters, "COUNTERS:oid:0x1000", [("SAI_PORT_STAT_IF_IN_UCAST_PKTS", "100")]);
        store.hset_default(Store::Counters, "COUNTERS:oid:0x1004", [("SAI_PORT_STAT_IF_IN_UCAST_PKTS", "7")]);
        store.hset_default(
            Store::Counters,
            QUEUE_NAME_MAP,
            [("Ethernet0:0", "oid:0x2000"), ("Ethernet4:0", "oid:0x2004")],
        );
        store.hset_default(Store::Counters, "COUNTERS:oid:0x2000", [("SAI_QUEUE_STAT_PACKETS", "5")]);
        store.hset_default(Store::Counters, "COUNTERS:oid:0x2004", [("SAI_QUEUE_STAT_PACKETS", "9")]);
        store
    }

    #[test]
    fn test_query_arity() {
        assert!(Query::new(["CONFIG_DB"]).is_err());
        assert!(Query::new(["CONFIG_DB", "PORT"]).is_ok());
        assert!(Query::new(["CONFIG_DB", "PORT", "Ethernet0", "x", "alias"]).is_ok());
        assert!(Query::new(["CONFIG_DB", "PORT", "a", "b", "c", "d"]).is_err());
        assert!(Query::new(["NOT_A_DB", "PORT"]).is_err());
    }

    #[tokio::test]
    async fn test_whole_table_keys_are_relative() {
        let store = MemoryStore::new();
        store.hset_default(Store::Appl, "PORT_TABLE:Ethernet0", [("oper_status", "up")]);
        store.hset_default(Store::Appl, "PORT_TABLE:Ethernet4", [("oper_status", "down")]);
        let resolver = resolver_with(store);

        let data = resolver.resolve_raw(&[&["APPL_DB", "PORT_TABLE"]]).await.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(field_value(&data, "Ethernet4", "oper_status").as_deref(), Some("down"));
    }

    #[tokio::test]
    async fn test_empty_table_is_not_an_error() {
        let resolver = resolver_with(MemoryStore::new());
        let data = resolver.resolve_raw(&[&["CONFIG_DB", "BGP_NEIGHBOR"]]).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_concrete_key_uses_full_key() {
        let store = MemoryStore::new();
        let asic0 = StoreTarget::new(Store::Config, "asic0");
        store.hset(&asic0, "DEVICE_METADATA|localhost", [("sub_role", "Backend")]);
        let resolver = resolver_with(store);

        let data = resolver
            .resolve_raw(&[&["CONFIG_DB/asic0", "DEVICE_METADATA", "localhost"]])
            .await
            .unwrap();
        assert_eq!(
            field_value(&data, "DEVICE_METADATA|localhost", "sub_role").as_deref(),
            Some("Backend")
        );
    }

    #[tokio::test]
    async fn test_missing_concrete_key_fails() {
        let resolver = resolver_with(MemoryStore::new());
        let err = resolver
            .resolve_raw(&[&["CONFIG_DB", "DEVICE_METADATA", "localhost"]])
            .await
            .unwrap_err();
        assert!(matches!(err, ShowError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_key_then_field() {
        let store = MemoryStore::new();
        store.hset_default(Store::Config, "PORT|Ethernet0", [("alias", "etp1"), ("speed", "100000")]);
        let resolver = resolver_with(store);

        let data = resolver
            .resolve_raw(&[&["CONFIG_DB", "PORT", "Ethernet0", "alias"]])
            .await
            .unwrap();
        let row = data["PORT|Ethernet0"].as_object().unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row["alias"], "etp1");
    }

    #[tokio::test]
    async fn test_two_keys_row() {
        let store = MemoryStore::new();
        store.hset_default(Store::Config, "VLAN_MEMBER|Vlan100|Ethernet0", [("tagging_mode", "untagged")]);
        let resolver = resolver_with(store);

        let data = resolver
            .resolve_raw(&[&["CONFIG_DB", "VLAN_MEMBER", "Vlan100", "Ethernet0"]])
            .await
            .unwrap();
        assert!(data.contains_key("VLAN_MEMBER|Vlan100|Ethernet0"));
    }

    #[tokio::test]
    async fn test_flat_hash_table() {
        let store = MemoryStore::new();
        store.hset_default(Store::Counters, "COUNTERS_RIF_NAME_MAP", [("Vlan100", "oid:0x6000")]);
        let resolver = resolver_with(store);

        let data = resolver
            .resolve_raw(&[&["COUNTERS_DB", "COUNTERS_RIF_NAME_MAP"]])
            .await
            .unwrap();
        assert_eq!(data["Vlan100"], "oid:0x6000");
    }

    #[tokio::test]
    async fn test_port_counters_by_name() {
        let resolver = resolver_with(counters_store());

        let data = resolver
            .resolve_raw(&[&["COUNTERS_DB", "COUNTERS", "Ethernet*"]])
            .await
            .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(
            field_value(&data, "Ethernet0", "SAI_PORT_STAT_IF_IN_UCAST_PKTS").as_deref(),
            Some("100")
        );

        let single = resolver
            .resolve_raw(&[&["COUNTERS_DB", "COUNTERS", "Ethernet4"]])
            .await
            .unwrap();
        assert_eq!(single.len(), 1);
        assert!(single.contains_key("Ethernet4"));
    }

    #[tokio::test]
    async fn test_unknown_port_fails() {
        let resolver = resolver_with(counters_store());
        assert!(resolver
            .resolve_raw(&[&["COUNTERS_DB", "COUNTERS", "Ethernet96"]])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_queue_counters_path() {
        let resolver = resolver_with(counters_store());

        let data = resolver
            .resolve_raw(&[&["COUNTERS_DB", "COUNTERS", "Ethernet0", "Queues"]])
            .await
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(
            field_value(&data, "Ethernet0:0", "SAI_QUEUE_STAT_PACKETS").as_deref(),
            Some("5")
        );
    }

    #[tokio::test]
    async fn test_any_failing_query_fails_call() {
        let store = counters_store();
        store.fail_namespace("asic0");
        let resolver = resolver_with(store);

        let result = resolver
            .resolve_raw(&[
                &["COUNTERS_DB", "COUNTERS", "Ethernet*"],
                &["CONFIG_DB/asic0", "PORT"],
            ])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_later_queries_overwrite() {
        let store = MemoryStore::new();
        store.hset_default(Store::Appl, "PORT_TABLE:Ethernet0", [("speed", "40000")]);
        store.hset_default(Store::State, "PORT_TABLE|Ethernet0", [("speed", "100000")]);
        let resolver = resolver_with(store);

        let data = resolver
            .resolve_raw(&[&["APPL_DB", "PORT_TABLE"], &["STATE_DB", "PORT_TABLE"]])
            .await
            .unwrap();
        assert_eq!(field_value(&data, "Ethernet0", "speed").as_deref(), Some("100000"));
    }
}
