//! Router-interface (RIF) counters.
//!
//! RIF counters are keyed by object id only, so every read goes through
//! `COUNTERS_RIF_NAME_MAP` first. Unlike port counters, a missing name map
//! is a hard failure and an unknown requested interface is rejected.

use crate::context::ShowContext;
use crate::counters::views::Rows;
use crate::counters::{Counter, MISSING_VALUE};
use crate::diff::{field_diff, sample_with_window, SampleWindow};
use crate::error::{Result, ShowError};
use crate::naming::natural_cmp;
use crate::query::{field_value, DataMap, Query};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const RIF_NAME_MAP: &str = "COUNTERS_RIF_NAME_MAP";
const RIF_STAT_PREFIX: &str = "SAI_ROUTER_INTERFACE_STAT_";

/// Counters of one router interface. Rates are passed through as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RifCounters {
    pub rx_ok_packets: Counter,
    pub rx_bps: String,
    pub rx_pps: String,
    pub rx_err_packets: Counter,
    pub tx_ok_packets: Counter,
    pub tx_bps: String,
    pub tx_pps: String,
    pub tx_err_packets: Counter,
    pub rx_err_bits: Counter,
    pub tx_err_bits: Counter,
    pub rx_ok_bits: Counter,
    pub tx_ok_bits: Counter,
}

impl RifCounters {
    fn read(counters: &DataMap, rates: &DataMap, oid: &str) -> Self {
        let stat = |suffix: &str| read_stat(counters, oid, suffix);
        let rate = |field: &str| {
            field_value(rates, oid, field).unwrap_or_else(|| MISSING_VALUE.to_string())
        };
        Self {
            rx_ok_packets: stat("IN_PACKETS"),
            rx_bps: rate("RX_BPS"),
            rx_pps: rate("RX_PPS"),
            rx_err_packets: stat("IN_ERROR_PACKETS"),
            tx_ok_packets: stat("OUT_PACKETS"),
            tx_bps: rate("TX_BPS"),
            tx_pps: rate("TX_PPS"),
            tx_err_packets: stat("OUT_ERROR_PACKETS"),
            rx_err_bits: stat("IN_ERROR_OCTETS"),
            tx_err_bits: stat("OUT_ERROR_OCTETS"),
            rx_ok_bits: stat("IN_OCTETS"),
            tx_ok_bits: stat("OUT_OCTETS"),
        }
    }

    /// Clamped difference; rates come from `new`.
    pub fn diff(old: &Self, new: &Self) -> Self {
        let d = |old: Counter, new: Counter| field_diff(old, new, true);
        Self {
            rx_ok_packets: d(old.rx_ok_packets, new.rx_ok_packets),
            rx_bps: new.rx_bps.clone(),
            rx_pps: new.rx_pps.clone(),
            rx_err_packets: d(old.rx_err_packets, new.rx_err_packets),
            tx_ok_packets: d(old.tx_ok_packets, new.tx_ok_packets),
            tx_bps: new.tx_bps.clone(),
            tx_pps: new.tx_pps.clone(),
            tx_err_packets: d(old.tx_err_packets, new.tx_err_packets),
            rx_err_bits: d(old.rx_err_bits, new.rx_err_bits),
            tx_err_bits: d(old.tx_err_bits, new.tx_err_bits),
            rx_ok_bits: d(old.rx_ok_bits, new.rx_ok_bits),
            tx_ok_bits: d(old.tx_ok_bits, new.tx_ok_bits),
        }
    }
}

fn read_stat(counters: &DataMap, oid: &str, suffix: &str) -> Counter {
    let field = format!("{}{}", RIF_STAT_PREFIX, suffix);
    match field_value(counters, oid, &field) {
        None => Counter::Missing,
        Some(raw) => {
            let value = Counter::parse(&raw);
            if value.is_missing() {
                warn!("Invalid counter value {} for {} of {}", raw, field, oid);
            }
            value
        }
    }
}

/// RIF snapshots keyed by interface name.
pub type RifSnapshot = BTreeMap<String, RifCounters>;

/// Difference of two RIF snapshots; interfaces new in `new` pass through.
pub fn diff_rif(old: &RifSnapshot, new: &RifSnapshot) -> RifSnapshot {
    new.iter()
        .map(|(name, newer)| {
            let value = match old.get(name) {
                Some(older) => RifCounters::diff(older, newer),
                None => newer.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Reads `COUNTERS_RIF_NAME_MAP` (interface name to object id).
pub async fn rif_name_map(ctx: &ShowContext) -> Result<DataMap> {
    let query = Query::new(["COUNTERS_DB", RIF_NAME_MAP])?;
    let map = ctx.resolver().resolve(&[query]).await.map_err(|e| {
        ShowError::internal(format!("Failed to get {}: {}", RIF_NAME_MAP, e))
    })?;
    if map.is_empty() {
        return Err(ShowError::internal(format!("No {} in DB", RIF_NAME_MAP)));
    }
    Ok(map)
}

/// Current counters of `interface`, or of every RIF in `name_map` when
/// `None`.
pub async fn rif_snapshot(
    ctx: &ShowContext,
    name_map: &DataMap,
    interface: Option<&str>,
) -> Result<RifSnapshot> {
    let counters = ctx
        .resolver()
        .resolve(&[Query::new(["COUNTERS_DB", "COUNTERS"])?])
        .await?;
    let rates = ctx
        .resolver()
        .resolve(&[Query::new(["COUNTERS_DB", "RATES"])?])
        .await?;

    let mut snapshot = RifSnapshot::new();
    for (name, oid) in name_map {
        if interface.is_some_and(|wanted| wanted != name) {
            continue;
        }
        let Some(oid) = oid.as_str() else {
            warn!("Invalid OID for RIF {}: {}", name, oid);
            continue;
        };
        if oid.is_empty() {
            warn!("Empty OID for RIF {}", name);
            continue;
        }
        snapshot.insert(name.clone(), RifCounters::read(&counters, &rates, oid));
    }
    debug!("Built RIF snapshot for {} interfaces", snapshot.len());
    Ok(snapshot)
}

/// Parameters of a RIF counter request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RifRequest {
    /// Single interface; every RIF when unset.
    pub interface: Option<String>,
    pub window: SampleWindow,
}

/// RIF counters, optionally differenced over the request window.
///
/// The name map is read once; both samples of a window use it.
pub async fn rif_counters(
    ctx: &ShowContext,
    request: &RifRequest,
    cancel: &CancellationToken,
) -> Result<Rows<RifCounters>> {
    let interface = request.interface.as_deref();
    let name_map = rif_name_map(ctx).await?;
    if let Some(name) = interface {
        if !name_map.contains_key(name) {
            return Err(ShowError::invalid(format!(
                "Interface {} not found in {}, Make sure it exists",
                name, RIF_NAME_MAP
            )));
        }
    }

    let snapshot = sample_with_window(
        request.window,
        cancel,
        || rif_snapshot(ctx, &name_map, interface),
        diff_rif,
    )
    .await?;

    let mut rows: Vec<(String, RifCounters)> = snapshot.into_iter().collect();
    rows.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
    Ok(Rows(rows))
}
