//! Interface naming: canonical port names vs operator aliases.
//!
//! The stores are keyed by canonical names (`Ethernet0`) while operators may
//! work with aliases (`etp1`). [`AliasMap`] holds the bijection and applies a
//! per-request [`NamingMode`].

use crate::error::{Result, ShowError};
use crate::query::{DataMap, Query, QueryResolver};
use crate::store::{Store, StoreTarget};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Separator between a port name and its VLAN sub-interface id.
const VLAN_SUB_INTERFACE_SEPARATOR: char = '.';

/// Per-request naming mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamingMode {
    /// Canonical names in and out.
    #[default]
    Default,
    /// Aliases in and out.
    Alias,
}

impl NamingMode {
    /// Parses the request option; anything but `alias` is the default mode.
    pub fn from_option(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("alias") => NamingMode::Alias,
            _ => NamingMode::Default,
        }
    }
}

/// Canonical name to alias bijection, built once from CONFIG_DB `PORT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    name_to_alias: HashMap<String, String>,
    alias_to_name: HashMap<String, String>,
}

impl AliasMap {
    /// Builds a map from `(canonical, alias)` pairs.
    pub fn from_pairs<I, N, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, A)>,
        N: Into<String>,
        A: Into<String>,
    {
        let mut map = Self::default();
        for (name, alias) in pairs {
            let (name, alias) = (name.into(), alias.into());
            map.alias_to_name.insert(alias.clone(), name.clone());
            map.name_to_alias.insert(name, alias);
        }
        map
    }

    /// Reads the `alias` field of every CONFIG_DB `PORT` row.
    pub async fn load(resolver: &QueryResolver) -> Result<Self> {
        let query = Query::for_target(&StoreTarget::default_ns(Store::Config), "PORT", &[])?;
        let ports = resolver.resolve(&[query]).await?;
        let map = Self::from_pairs(ports.iter().filter_map(|(name, row)| {
            let alias = row.as_object()?.get("alias")?.as_str()?;
            Some((name.clone(), alias.to_string()))
        }));
        debug!("Loaded {} interface aliases", map.len());
        Ok(map)
    }

    /// Number of mapped interfaces.
    pub fn len(&self) -> usize {
        self.name_to_alias.len()
    }

    /// True when no interface has an alias.
    pub fn is_empty(&self) -> bool {
        self.name_to_alias.is_empty()
    }

    /// Alias of a canonical name.
    pub fn alias_of(&self, name: &str) -> Option<&str> {
        self.name_to_alias.get(name).map(String::as_str)
    }

    /// Canonical name of an alias.
    pub fn name_of(&self, alias: &str) -> Option<&str> {
        self.alias_to_name.get(alias).map(String::as_str)
    }

    /// Name to show for `canonical`: its alias in alias mode (keeping any
    /// `.<vlan>` suffix), the canonical name otherwise.
    pub fn display_name(&self, canonical: &str, mode: NamingMode) -> String {
        if canonical.is_empty() || mode != NamingMode::Alias {
            return canonical.to_string();
        }
        let (base, suffix) = match canonical.find(VLAN_SUB_INTERFACE_SEPARATOR) {
            Some(idx) => canonical.split_at(idx),
            None => (canonical, ""),
        };
        match self.alias_of(base) {
            Some(alias) => format!("{}{}", alias, suffix),
            None => canonical.to_string(),
        }
    }

    /// Canonical name for a user-supplied interface name.
    ///
    /// Alias mode is strict: the input must be a known alias that maps to a
    /// different name.
    pub fn to_canonical(&self, input: &str, mode: NamingMode) -> Result<String> {
        if mode != NamingMode::Alias {
            return Ok(input.to_string());
        }
        match self.name_of(input) {
            Some(name) if !name.is_empty() && name != input => Ok(name.to_string()),
            _ => Err(ShowError::UnknownAlias(input.to_string())),
        }
    }

    /// Re-keys alias-keyed rows by canonical name.
    ///
    /// Leaves the map untouched when no key is a known alias; otherwise only
    /// rows keyed by a known alias survive.
    pub fn remap_keys_to_canonical(&self, rows: DataMap) -> DataMap {
        if !rows.keys().any(|key| self.alias_to_name.contains_key(key)) {
            return rows;
        }
        rows.into_iter()
            .filter_map(|(alias, row)| {
                let name = self.alias_to_name.get(&alias)?;
                Some((name.clone(), row))
            })
            .collect()
    }

    /// Re-keys `<port><sep><suffix>` rows, remapping only the port part.
    ///
    /// Keys without the separator are dropped; unknown ports keep their key.
    pub fn remap_composite_keys_to_canonical(&self, rows: DataMap, sep: &str) -> DataMap {
        let mut remapped = DataMap::new();
        for (key, row) in rows {
            let Some((port, suffix)) = key.split_once(sep) else {
                warn!("Ignoring the invalid queue '{}'", key);
                continue;
            };
            match self.alias_to_name.get(port) {
                Some(name) => {
                    remapped.insert(format!("{}{}{}", name, sep, suffix), row);
                }
                None => {
                    remapped.insert(key, row);
                }
            }
        }
        remapped
    }
}

/// Compares interface names so that embedded numbers sort numerically
/// (`Ethernet2` before `Ethernet10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.as_bytes();
    let mut b = b.as_bytes();
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let (na, rest_a) = split_digits(a);
                let (nb, rest_b) = split_digits(b);
                let ta = trim_zeros(na);
                let tb = trim_zeros(nb);
                let ord = ta
                    .len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = rest_a;
                b = rest_b;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let end = s.iter().position(|c| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[start..]
}

/// Sorts names in natural order.
pub fn natsort(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

/// Turns a map into `(key, value)` pairs in natural key order.
pub fn natsorted_entries(map: DataMap) -> Vec<(String, Value)> {
    let mut entries: Vec<(String, Value)> = map.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aliases() -> AliasMap {
        AliasMap::from_pairs([("Ethernet0", "etp1"), ("Ethernet4", "etp2")])
    }

    fn rows(keys: &[&str]) -> DataMap {
        keys.iter()
            .map(|k| (k.to_string(), json!({"v": *k})))
            .collect()
    }

    #[test]
    fn test_naming_mode_from_option() {
        assert_eq!(NamingMode::from_option(Some("alias")), NamingMode::Alias);
        assert_eq!(NamingMode::from_option(Some("default")), NamingMode::Default);
        assert_eq!(NamingMode::from_option(Some("")), NamingMode::Default);
        assert_eq!(NamingMode::from_option(Some("bogus")), NamingMode::Default);
        assert_eq!(NamingMode::from_option(None), NamingMode::Default);
    }

    #[test]
    fn test_display_name() {
        let map = aliases();
        assert_eq!(map.display_name("Ethernet0", NamingMode::Alias), "etp1");
        assert_eq!(map.display_name("Ethernet0", NamingMode::Default), "Ethernet0");
        assert_eq!(map.display_name("Ethernet0.100", NamingMode::Alias), "etp1.100");
        assert_eq!(map.display_name("Ethernet8", NamingMode::Alias), "Ethernet8");
        assert_eq!(map.display_name("", NamingMode::Alias), "");
    }

    #[test]
    fn test_alias_round_trip() {
        let map = aliases();
        for name in ["Ethernet0", "Ethernet4"] {
            let shown = map.display_name(name, NamingMode::Alias);
            assert_eq!(map.to_canonical(&shown, NamingMode::Alias).unwrap(), name);
        }
    }

    #[test]
    fn test_alias_mode_is_strict() {
        let map = aliases();
        let err = map.to_canonical("Ethernet0", NamingMode::Alias).unwrap_err();
        assert!(matches!(err, ShowError::UnknownAlias(ref a) if a == "Ethernet0"));
        assert!(map.to_canonical("etp9", NamingMode::Alias).is_err());
        assert_eq!(
            map.to_canonical("Ethernet0", NamingMode::Default).unwrap(),
            "Ethernet0"
        );
    }

    #[test]
    fn test_alias_mapping_to_itself_is_rejected() {
        let map = AliasMap::from_pairs([("Ethernet0", "Ethernet0")]);
        assert!(map.to_canonical("Ethernet0", NamingMode::Alias).is_err());
    }

    #[test]
    fn test_remap_keys_noop_for_canonical_keys() {
        let map = aliases();
        let input = rows(&["Ethernet0", "Ethernet4", "Ethernet8"]);
        assert_eq!(map.remap_keys_to_canonical(input.clone()), input);
    }

    #[test]
    fn test_remap_keys_drops_unmapped() {
        let map = aliases();
        let remapped = map.remap_keys_to_canonical(rows(&["etp1", "etp2", "Ethernet8"]));
        let keys: Vec<&String> = remapped.keys().collect();
        assert_eq!(keys, vec!["Ethernet0", "Ethernet4"]);
        assert_eq!(remapped["Ethernet0"], json!({"v": "etp1"}));
    }

    #[test]
    fn test_remap_composite_keys() {
        let map = aliases();
        let remapped =
            map.remap_composite_keys_to_canonical(rows(&["etp1:0", "Ethernet8:3", "bogus"]), ":");
        assert!(remapped.contains_key("Ethernet0:0"));
        assert!(remapped.contains_key("Ethernet8:3"));
        assert_eq!(remapped.len(), 2);
    }

    #[test]
    fn test_natural_order() {
        let mut names: Vec<String> = ["Ethernet10", "Ethernet2", "Ethernet1", "PortChannel01", "Ethernet100"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        natsort(&mut names);
        assert_eq!(
            names,
            vec!["Ethernet1", "Ethernet2", "Ethernet10", "Ethernet100", "PortChannel01"]
        );
        assert_eq!(natural_cmp("Ethernet0", "Ethernet0"), Ordering::Equal);
        assert_eq!(natural_cmp("Eth", "Ethernet"), Ordering::Less);
    }
}
