//! Multi-ASIC namespace topology.
//!
//! On a multi-ASIC chassis each ASIC runs its own set of databases in a
//! namespace named `asic<N>`. Every namespace declares its role through
//! `DEVICE_METADATA|localhost` `sub_role`; single-ASIC systems are modelled as
//! one frontend namespace with the empty identifier.

use crate::error::Result;
use crate::ip_interfaces::IpInterfaceDetail;
use crate::query::{field_value, Query, QueryResolver};
use crate::store::{Store, StoreTarget};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Identifier of the default (host) namespace.
pub const DEFAULT_NAMESPACE: &str = "";

const ASIC_NAME_PREFIX: &str = "asic";
const DEVICE_METADATA_KEY: &str = "DEVICE_METADATA|localhost";

/// Namespaces grouped by their role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRoleSet {
    /// Namespaces facing the front panel.
    pub frontend: Vec<String>,
    /// Namespaces on the internal backplane.
    pub backend: Vec<String>,
    /// Fabric namespaces.
    pub fabric: Vec<String>,
}

impl NamespaceRoleSet {
    /// Role set of a single-ASIC system.
    pub fn single_asic() -> Self {
        Self {
            frontend: vec![DEFAULT_NAMESPACE.to_string()],
            ..Default::default()
        }
    }

    /// Discovers the namespaces of an `asic_count`-ASIC system.
    ///
    /// Single-ASIC systems issue no store query. A namespace whose metadata
    /// cannot be read, or that carries no known `sub_role`, is skipped.
    pub async fn discover(resolver: &QueryResolver, asic_count: usize) -> Result<Self> {
        if asic_count <= 1 {
            return Ok(Self::single_asic());
        }

        let mut roles = Self::default();
        for index in 0..asic_count {
            let namespace = format!("{}{}", ASIC_NAME_PREFIX, index);
            let target = StoreTarget::new(Store::Config, namespace.as_str());
            let query = Query::for_target(&target, "DEVICE_METADATA", &["localhost"])?;

            let metadata = match resolver.resolve(&[query]).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("could not get metadata for namespace '{}': {}", namespace, e);
                    continue;
                }
            };

            match field_value(&metadata, DEVICE_METADATA_KEY, "sub_role").as_deref() {
                Some("Frontend") => roles.frontend.push(namespace),
                Some("Backend") => roles.backend.push(namespace),
                Some("Fabric") => roles.fabric.push(namespace),
                Some(other) => warn!("unknown sub_role '{}' for namespace '{}'", other, namespace),
                None => warn!("could not parse metadata for namespace '{}'", namespace),
            }
        }
        debug!(
            "Discovered namespaces: frontend={:?} backend={:?} fabric={:?}",
            roles.frontend, roles.backend, roles.fabric
        );
        Ok(roles)
    }

    /// True when more than the default namespace exists.
    pub fn is_multi_asic(&self) -> bool {
        self.all().any(|ns| ns != DEFAULT_NAMESPACE)
    }

    /// Whether a namespace is part of the discovered topology.
    pub fn contains(&self, namespace: &str) -> bool {
        self.all().any(|ns| ns == namespace)
    }

    /// Frontend namespaces followed by backend ones.
    pub fn frontend_and_backend(&self) -> Vec<String> {
        self.frontend.iter().chain(&self.backend).cloned().collect()
    }

    fn all(&self) -> impl Iterator<Item = &str> {
        self.frontend
            .iter()
            .chain(&self.backend)
            .chain(&self.fabric)
            .map(String::as_str)
    }
}

/// Joins per-namespace interface results by interface name.
///
/// Each interface's addresses are the union across namespaces with exact
/// duplicates removed; the first non-empty status and master win. Merging
/// the same namespace result twice is a no-op.
pub fn merge_across_namespaces<I>(per_namespace: I) -> Vec<IpInterfaceDetail>
where
    I: IntoIterator<Item = (String, Vec<IpInterfaceDetail>)>,
{
    let mut merged: Vec<IpInterfaceDetail> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (namespace, interfaces) in per_namespace {
        debug!("Merging {} interfaces from namespace '{}'", interfaces.len(), namespace);
        for interface in interfaces {
            let Some(&slot) = index.get(&interface.name) else {
                index.insert(interface.name.clone(), merged.len());
                let mut fresh = IpInterfaceDetail {
                    ip_addresses: Vec::new(),
                    ..interface.clone()
                };
                fresh.absorb_addresses(interface.ip_addresses);
                merged.push(fresh);
                continue;
            };

            let existing = &mut merged[slot];
            if existing.admin_status.is_empty() {
                existing.admin_status = interface.admin_status;
            }
            if existing.oper_status.is_empty() {
                existing.oper_status = interface.oper_status;
            }
            if existing.master.is_none() {
                existing.master = interface.master;
            }
            existing.absorb_addresses(interface.ip_addresses);
        }
    }
    merged
}
