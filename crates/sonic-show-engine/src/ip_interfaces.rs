//! IP interface listing across namespaces.
//!
//! Interface records are collected per namespace through an
//! [`InterfaceSource`], merged by name, enriched with BGP peer data and
//! filtered for display.

use crate::context::ShowContext;
use crate::error::{Result, ShowError};
use crate::naming::natural_cmp;
use crate::query::{field_value, DataMap, Query, QueryResolver};
use crate::store::{Store, StoreTarget};
use crate::topology::{merge_across_namespaces, DEFAULT_NAMESPACE};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, warn};

const BGP_NEIGHBOR_TABLE: &str = "BGP_NEIGHBOR";
const UNKNOWN_STATUS: &str = "N/A";

/// A single address on an interface, optionally tied to a BGP peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpAddressDetail {
    /// Address in CIDR notation.
    pub address: String,
    /// Peer address of the BGP session using this address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_neighbor_ip: Option<String>,
    /// Peer name of that session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_neighbor_name: Option<String>,
}

impl IpAddressDetail {
    /// Address without BGP data.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            bgp_neighbor_ip: None,
            bgp_neighbor_name: None,
        }
    }
}

/// Consolidated view of one layer-3 interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpInterfaceDetail {
    pub name: String,
    pub ip_addresses: Vec<IpAddressDetail>,
    pub admin_status: String,
    pub oper_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
}

impl IpInterfaceDetail {
    /// Appends addresses not already present.
    pub fn absorb_addresses(&mut self, addresses: impl IntoIterator<Item = IpAddressDetail>) {
        for address in addresses {
            if !self.ip_addresses.iter().any(|a| a.address == address.address) {
                self.ip_addresses.push(address);
            }
        }
    }
}

/// Address family filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Parses `ipv4` or `ipv6`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "ipv4" => Ok(AddressFamily::Ipv4),
            "ipv6" => Ok(AddressFamily::Ipv6),
            other => Err(ShowError::invalid(format!(
                "unsupported address family '{}'",
                other
            ))),
        }
    }

    /// Whether a CIDR string belongs to this family.
    pub fn matches(&self, cidr: &str) -> bool {
        let host = cidr.split('/').next().unwrap_or(cidr);
        let is_v6 = match host.parse::<IpAddr>() {
            Ok(ip) => ip.is_ipv6(),
            Err(_) => host.contains(':'),
        };
        match self {
            AddressFamily::Ipv4 => !is_v6,
            AddressFamily::Ipv6 => is_v6,
        }
    }
}

/// Which interfaces to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Every interface, internal ones included.
    All,
    /// Front-panel interfaces only.
    Frontend,
}

impl DisplayMode {
    /// Parses `all` or `frontend`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "all" => Ok(DisplayMode::All),
            "frontend" => Ok(DisplayMode::Frontend),
            other => Err(ShowError::invalid(format!("invalid display option '{}'", other))),
        }
    }

    /// Whether an interface is hidden in this mode.
    pub fn hides(&self, name: &str) -> bool {
        if *self == DisplayMode::All {
            return false;
        }
        name.starts_with("Loopback4096")
            || name.starts_with("veth")
            || (name.starts_with("eth") && name != "eth0")
            || name.starts_with("Ethernet-BP")
            || name.starts_with("Ethernet-IB")
            || name.starts_with("Ethernet-Rec")
    }
}

/// Peer seen on a local address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpNeighborInfo {
    pub name: String,
    pub neighbor_ip: String,
}

/// Produces the interface records of one namespace.
#[async_trait]
pub trait InterfaceSource: Send + Sync {
    async fn interfaces(&self, namespace: &str, family: AddressFamily) -> Result<Vec<IpInterfaceDetail>>;
}

/// Kinds of CONFIG_DB interface tables and where their status lives.
const INTERFACE_TABLES: [(&str, Option<&str>); 5] = [
    ("INTERFACE", Some("PORT_TABLE")),
    ("VLAN_SUB_INTERFACE", Some("PORT_TABLE")),
    ("PORTCHANNEL_INTERFACE", Some("LAG_TABLE")),
    ("VLAN_INTERFACE", Some("VLAN_TABLE")),
    ("LOOPBACK_INTERFACE", None),
];

/// Reads interfaces from the CONFIG_DB `*INTERFACE` tables and their status
/// from APPL_DB.
#[derive(Clone)]
pub struct ConfigDbInterfaceSource {
    resolver: QueryResolver,
}

impl ConfigDbInterfaceSource {
    pub fn new(resolver: QueryResolver) -> Self {
        Self { resolver }
    }

    async fn table(&self, store: Store, namespace: &str, table: &str) -> Result<DataMap> {
        let target = StoreTarget::new(store, namespace);
        let query = Query::for_target(&target, table, &[])?;
        self.resolver.resolve(&[query]).await
    }
}

#[async_trait]
impl InterfaceSource for ConfigDbInterfaceSource {
    async fn interfaces(&self, namespace: &str, family: AddressFamily) -> Result<Vec<IpInterfaceDetail>> {
        let config_sep = self.resolver.separator(Store::Config).to_string();
        let mut status_tables: HashMap<&str, DataMap> = HashMap::new();
        let mut records: Vec<IpInterfaceDetail> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (table, status_table) in INTERFACE_TABLES {
            let rows = self.table(Store::Config, namespace, table).await?;
            if rows.is_empty() {
                continue;
            }
            if let Some(status_table) = status_table {
                if !status_tables.contains_key(status_table) {
                    let status = self.table(Store::Appl, namespace, status_table).await?;
                    status_tables.insert(status_table, status);
                }
            }

            for (key, row) in &rows {
                let (name, address) = match key.split_once(config_sep.as_str()) {
                    Some((name, address)) => (name, Some(address)),
                    None => (key.as_str(), None),
                };
                let slot = match index.get(name) {
                    Some(&slot) => slot,
                    None => {
                        let (admin_status, oper_status) = match status_table {
                            Some(status_table) => {
                                let status = &status_tables[status_table];
                                (
                                    field_value(status, name, "admin_status")
                                        .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
                                    field_value(status, name, "oper_status")
                                        .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
                                )
                            }
                            None => ("up".to_string(), "up".to_string()),
                        };
                        index.insert(name.to_string(), records.len());
                        records.push(IpInterfaceDetail {
                            name: name.to_string(),
                            ip_addresses: Vec::new(),
                            admin_status,
                            oper_status,
                            master: None,
                        });
                        records.len() - 1
                    }
                };

                let record = &mut records[slot];
                match address {
                    Some(address) if family.matches(address) => {
                        record.absorb_addresses([IpAddressDetail::new(address)]);
                    }
                    Some(_) => {}
                    None => {
                        if let Some(vrf) = row
                            .as_object()
                            .and_then(|r| r.get("vrf_name"))
                            .and_then(|v| v.as_str())
                        {
                            record.master = Some(vrf.to_string());
                        }
                    }
                }
            }
        }

        records.retain(|r| !r.ip_addresses.is_empty());
        debug!(
            "Namespace '{}' has {} interfaces with {:?} addresses",
            namespace,
            records.len(),
            family
        );
        Ok(records)
    }
}

/// Reads `BGP_NEIGHBOR` of a namespace, keyed by local address.
///
/// Rows whose key is not an IP address or that lack `local_addr` are skipped.
pub async fn bgp_neighbors(
    resolver: &QueryResolver,
    namespace: &str,
) -> Result<HashMap<String, BgpNeighborInfo>> {
    let target = StoreTarget::new(Store::Config, namespace);
    let query = Query::for_target(&target, BGP_NEIGHBOR_TABLE, &[])?;
    let rows = resolver.resolve(&[query]).await?;

    let mut neighbors = HashMap::new();
    for (neighbor_ip, row) in &rows {
        if neighbor_ip.parse::<IpAddr>().is_err() {
            warn!("Skipping entry {:?}: neighborIP is not a valid IP address", neighbor_ip);
            continue;
        }
        let Some(local_addr) = field_value(&rows, neighbor_ip, "local_addr") else {
            debug!("Skipping entry {:?}: missing local_addr", neighbor_ip);
            continue;
        };
        let name = row
            .as_object()
            .and_then(|r| r.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        neighbors.insert(
            local_addr,
            BgpNeighborInfo {
                name,
                neighbor_ip: neighbor_ip.clone(),
            },
        );
    }
    Ok(neighbors)
}

/// Attaches BGP peer data to every address whose host part is a local
/// address in `neighbors`. Unparseable addresses are left untouched.
pub fn enrich_with_bgp(
    interfaces: &mut [IpInterfaceDetail],
    neighbors: &HashMap<String, BgpNeighborInfo>,
) {
    for address in interfaces.iter_mut().flat_map(|i| i.ip_addresses.iter_mut()) {
        let host = address.address.split('/').next().unwrap_or_default();
        if host.parse::<IpAddr>().is_err() {
            debug!("Skipping BGP lookup for invalid address {}", address.address);
            continue;
        }
        if let Some(peer) = neighbors.get(host) {
            address.bgp_neighbor_ip = Some(peer.neighbor_ip.clone());
            address.bgp_neighbor_name = Some(peer.name.clone());
        }
    }
}

/// Parameters of an IP interface listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpInterfacesRequest {
    pub family: AddressFamily,
    /// Explicit namespace; all relevant namespaces when unset.
    pub namespace: Option<String>,
    /// Display filter; frontend on multi-ASIC systems, all otherwise.
    pub display: Option<DisplayMode>,
}

/// Lists IP interfaces, merged across the relevant namespaces.
///
/// A namespace that cannot be read is logged and left out of the result.
pub async fn ip_interfaces(
    ctx: &ShowContext,
    request: &IpInterfacesRequest,
) -> Result<Vec<IpInterfaceDetail>> {
    let roles = ctx.namespace_roles().await?;
    let display = request.display.unwrap_or(if roles.is_multi_asic() {
        DisplayMode::Frontend
    } else {
        DisplayMode::All
    });

    let mut namespaces = match &request.namespace {
        Some(namespace) => {
            if !roles.contains(namespace) {
                return Err(ShowError::UnknownNamespace(namespace.clone()));
            }
            vec![namespace.clone()]
        }
        None => match display {
            DisplayMode::All => roles.frontend_and_backend(),
            DisplayMode::Frontend => roles.frontend.clone(),
        },
    };
    if request.namespace.is_none() && !namespaces.iter().any(|ns| ns == DEFAULT_NAMESPACE) {
        namespaces.push(DEFAULT_NAMESPACE.to_string());
    }

    let source = ctx.interface_source();
    let mut per_namespace = Vec::with_capacity(namespaces.len());
    for namespace in &namespaces {
        match source.interfaces(namespace, request.family).await {
            Ok(interfaces) => per_namespace.push((namespace.clone(), interfaces)),
            Err(e) => warn!("Skipping namespace '{}': {}", namespace, e),
        }
    }

    let mut merged = merge_across_namespaces(per_namespace);
    merged.retain(|interface| !display.hides(&interface.name));

    let mut neighbors = HashMap::new();
    for namespace in &namespaces {
        match bgp_neighbors(ctx.resolver(), namespace).await {
            Ok(found) => neighbors.extend(found),
            Err(e) => warn!("Failed to read BGP neighbors in namespace '{}': {}", namespace, e),
        }
    }
    enrich_with_bgp(&mut merged, &neighbors);

    merged.sort_by(|a, b| natural_cmp(&a.name, &b.name));
    Ok(merged)
}
