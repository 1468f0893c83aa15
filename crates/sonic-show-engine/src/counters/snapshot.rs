//! Per-interface counter snapshots.
//!
//! A snapshot fuses four sources: port counters and rates from COUNTERS_DB,
//! admin/oper state and configured speed from APPL_DB, and the live speed
//! from STATE_DB. The STATE_DB read is best effort. Every snapshot is then
//! expressed relative to the counter baseline when one is available.

use super::format::{derived_utilization, parse_rate};
use super::{
    fec_bin_field, Counter, CounterField, CounterSnapshot, LinkState, Rates, SnapshotMap,
};
use crate::baseline::Baseline;
use crate::context::ShowContext;
use crate::error::Result;
use crate::query::{field_value, DataMap, Query};
use tracing::{debug, error, warn};

/// Builds counter snapshots for a [`ShowContext`].
pub struct CounterSnapshotEngine<'a> {
    ctx: &'a ShowContext,
}

impl<'a> CounterSnapshotEngine<'a> {
    pub fn new(ctx: &'a ShowContext) -> Self {
        Self { ctx }
    }

    /// Snapshot of `interfaces` (all interfaces when empty), relative to the
    /// counter baseline if one can be read.
    ///
    /// Requested names without counters are dropped silently.
    pub async fn snapshot(&self, interfaces: &[String]) -> Result<SnapshotMap> {
        let fresh = self.absolute_snapshot(interfaces).await?;
        match Baseline::load(self.ctx.baseline_path()).await {
            Some(baseline) => {
                debug!(
                    "Correcting {} interfaces against baseline cleared at {:?}",
                    fresh.len(),
                    baseline.cleared_at
                );
                Ok(baseline.correct(&fresh))
            }
            None => Ok(fresh),
        }
    }

    /// Snapshot of absolute counter values, ignoring any baseline.
    pub async fn absolute_snapshot(&self, interfaces: &[String]) -> Result<SnapshotMap> {
        let aliases = self.ctx.alias_map().await?;

        let port_counters = aliases.remap_keys_to_canonical(
            self.fetch(&["COUNTERS_DB", "COUNTERS", "Ethernet*"]).await?,
        );
        let port_rates = aliases.remap_keys_to_canonical(
            self.fetch(&["COUNTERS_DB", "RATES", "Ethernet*"]).await?,
        );
        let appl_ports = self.fetch(&["APPL_DB", "PORT_TABLE"]).await?;
        let state_ports = match self.fetch(&["STATE_DB", "PORT_TABLE"]).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Unable to read STATE_DB PORT_TABLE, using configured speeds: {}", e);
                DataMap::new()
            }
        };

        let selected: Vec<&String> = if interfaces.is_empty() {
            port_counters.keys().collect()
        } else {
            interfaces
                .iter()
                .filter(|name| port_counters.contains_key(name.as_str()))
                .collect()
        };

        let mut snapshots = SnapshotMap::new();
        for name in selected {
            let snapshot = build_snapshot(name, &port_counters, &port_rates, &appl_ports, &state_ports);
            snapshots.insert(name.clone(), snapshot);
        }
        debug!("Built counter snapshot for {} interfaces", snapshots.len());
        Ok(snapshots)
    }

    async fn fetch(&self, parts: &[&str]) -> Result<DataMap> {
        let query = Query::new(parts.iter().copied())?;
        self.ctx.resolver().resolve(&[query]).await.map_err(|e| {
            error!("Unable to pull data for query {:?}: {}", parts, e);
            e
        })
    }
}

fn build_snapshot(
    name: &str,
    counters: &DataMap,
    rates: &DataMap,
    appl_ports: &DataMap,
    state_ports: &DataMap,
) -> CounterSnapshot {
    let mut snapshot = CounterSnapshot {
        state: LinkState::from_status(
            field_value(appl_ports, name, "admin_status").as_deref(),
            field_value(appl_ports, name, "oper_status").as_deref(),
        ),
        ..Default::default()
    };

    for &field in CounterField::ALL {
        let value = Counter::sum(
            field
                .sources()
                .iter()
                .map(|source| read_counter(counters, name, source)),
        );
        snapshot.set(field, value);
    }

    for (bin, slot) in snapshot.fec_bins.iter_mut().enumerate() {
        *slot = match field_value(counters, name, &fec_bin_field(bin)) {
            Some(value) => Counter::parse(&value),
            None => Counter::Present(0),
        };
    }

    let rate = |field: &str| parse_rate(field_value(rates, name, field).as_deref());
    let speed = port_speed(name, appl_ports, state_ports);
    let rx_bps = rate("RX_BPS");
    let tx_bps = rate("TX_BPS");
    snapshot.rates = Rates {
        rx_bps,
        tx_bps,
        rx_pps: rate("RX_PPS"),
        tx_pps: rate("TX_PPS"),
        rx_util: rate("RX_UTIL").or_else(|| derived_utilization(rx_bps, speed)),
        tx_util: rate("TX_UTIL").or_else(|| derived_utilization(tx_bps, speed)),
        fec_pre_ber: rate("FEC_PRE_BER"),
        fec_post_ber: rate("FEC_POST_BER"),
    };
    snapshot
}

fn read_counter(data: &DataMap, name: &str, field: &str) -> Counter {
    field_value(data, name, field)
        .map(|value| Counter::parse(&value))
        .unwrap_or_default()
}

/// Live STATE_DB speed while the port is up, configured APPL_DB speed
/// otherwise. In Mb/s.
fn port_speed(name: &str, appl_ports: &DataMap, state_ports: &DataMap) -> Option<f64> {
    let oper_up = field_value(appl_ports, name, "oper_status").as_deref() == Some("up");
    let live = field_value(state_ports, name, "speed").filter(|_| oper_up);
    let speed = live.or_else(|| field_value(appl_ports, name, "speed"));
    parse_rate(speed.as_deref())
}
