//! Command-specific projections of counter snapshots.
//!
//! Each view is a plain `Serialize` record; values are rendered to display
//! strings here and nowhere earlier. Interface rows come out in natural name
//! order, keyed by the name shown under the request's [`NamingMode`].

use super::format::{ber, byte_rate, packet_rate, utilization};
use super::{Counter, CounterField, CounterSnapshot, SnapshotMap};
use crate::error::{Result, ShowError};
use crate::naming::{natural_cmp, AliasMap, NamingMode};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Counter projections a request can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterView {
    /// Default traffic summary.
    Counters,
    /// Summary plus packet rates and trim counters.
    All,
    /// Error, drop and oversize counters.
    Errors,
    /// Byte and packet rates with utilization.
    Rates,
    /// Trimmed packet counters.
    Trim,
    /// FEC correctable, uncorrectable and symbol errors with BER.
    FecStats,
    /// Codeword-error bins of a single interface.
    FecHistogram,
    /// Octet histograms, cast-type counters and the cleared-at marker.
    Detailed,
}

impl CounterView {
    /// Parses a view name as used in command paths.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "" | "counters" => Ok(CounterView::Counters),
            "all" | "printall" => Ok(CounterView::All),
            "errors" => Ok(CounterView::Errors),
            "rates" => Ok(CounterView::Rates),
            "trim" => Ok(CounterView::Trim),
            "fec-stats" => Ok(CounterView::FecStats),
            "fec-histogram" => Ok(CounterView::FecHistogram),
            "detailed" => Ok(CounterView::Detailed),
            other => Err(ShowError::invalid(format!("unknown counter view '{}'", other))),
        }
    }

    /// Views that only make sense for one named interface.
    pub fn requires_interface(self) -> bool {
        matches!(self, CounterView::FecHistogram | CounterView::Detailed)
    }

    /// Whether `period` applies. The histogram is always a single sample.
    pub fn supports_window(self) -> bool {
        self != CounterView::FecHistogram
    }

    /// Whether `verbose` summary totals apply.
    pub fn supports_summary(self) -> bool {
        !matches!(self, CounterView::FecHistogram | CounterView::Detailed)
    }
}

/// Rows keyed by display name, serialized as a map in the stored order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows<V>(pub Vec<(String, V)>);

impl<V> Rows<V> {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Row shown under `name`.
    pub fn get(&self, name: &str) -> Option<&V> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, row)| row)
    }
}

impl<V: Serialize> Serialize for Rows<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, row) in &self.0 {
            map.serialize_entry(name, row)?;
        }
        map.end()
    }
}

/// Applies `row` to every snapshot, in natural order of canonical names.
pub fn project<V, F>(
    snapshots: &SnapshotMap,
    aliases: &AliasMap,
    mode: NamingMode,
    row: F,
) -> Rows<V>
where
    F: Fn(&CounterSnapshot) -> V,
{
    let mut names: Vec<&String> = snapshots.keys().collect();
    names.sort_by(|a, b| natural_cmp(a, b));
    Rows(
        names
            .into_iter()
            .map(|name| (aliases.display_name(name, mode), row(&snapshots[name])))
            .collect(),
    )
}

fn show(snapshot: &CounterSnapshot, field: CounterField) -> String {
    snapshot.counter(field).to_string()
}

/// Default traffic summary of one interface.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountersRow {
    pub state: String,
    pub rx_ok: String,
    pub rx_bps: String,
    pub rx_util: String,
    pub rx_err: String,
    pub rx_drp: String,
    pub rx_ovr: String,
    pub tx_ok: String,
    pub tx_bps: String,
    pub tx_util: String,
    pub tx_err: String,
    pub tx_drp: String,
    pub tx_ovr: String,
}

impl CountersRow {
    /// Renders the row from a snapshot.
    pub fn new(s: &CounterSnapshot) -> Self {
        Self {
            state: s.state.code().to_string(),
            rx_ok: show(s, CounterField::RxOk),
            rx_bps: byte_rate(s.rates.rx_bps),
            rx_util: utilization(s.rates.rx_util),
            rx_err: show(s, CounterField::RxErr),
            rx_drp: show(s, CounterField::RxDrp),
            rx_ovr: show(s, CounterField::RxOvr),
            tx_ok: show(s, CounterField::TxOk),
            tx_bps: byte_rate(s.rates.tx_bps),
            tx_util: utilization(s.rates.tx_util),
            tx_err: show(s, CounterField::TxErr),
            tx_drp: show(s, CounterField::TxDrp),
            tx_ovr: show(s, CounterField::TxOvr),
        }
    }
}

/// Traffic summary extended with packet rates and trim counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllCountersRow {
    pub state: String,
    pub rx_ok: String,
    pub rx_bps: String,
    pub rx_pps: String,
    pub rx_util: String,
    pub rx_err: String,
    pub rx_drp: String,
    pub rx_ovr: String,
    pub tx_ok: String,
    pub tx_bps: String,
    pub tx_pps: String,
    pub tx_util: String,
    pub tx_err: String,
    pub tx_drp: String,
    pub tx_ovr: String,
    pub trim_pkts: String,
    pub trim_sent: String,
    pub trim_drp: String,
}

impl AllCountersRow {
    /// Renders the row from a snapshot.
    pub fn new(s: &CounterSnapshot) -> Self {
        Self {
            state: s.state.code().to_string(),
            rx_ok: show(s, CounterField::RxOk),
            rx_bps: byte_rate(s.rates.rx_bps),
            rx_pps: packet_rate(s.rates.rx_pps),
            rx_util: utilization(s.rates.rx_util),
            rx_err: show(s, CounterField::RxErr),
            rx_drp: show(s, CounterField::RxDrp),
            rx_ovr: show(s, CounterField::RxOvr),
            tx_ok: show(s, CounterField::TxOk),
            tx_bps: byte_rate(s.rates.tx_bps),
            tx_pps: packet_rate(s.rates.tx_pps),
            tx_util: utilization(s.rates.tx_util),
            tx_err: show(s, CounterField::TxErr),
            tx_drp: show(s, CounterField::TxDrp),
            tx_ovr: show(s, CounterField::TxOvr),
            trim_pkts: show(s, CounterField::TrimPkts),
            trim_sent: show(s, CounterField::TrimSent),
            trim_drp: show(s, CounterField::TrimDrp),
        }
    }
}

/// Error counters of one interface.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorsRow {
    pub state: String,
    pub rx_err: String,
    pub rx_drp: String,
    pub rx_ovr: String,
    pub tx_err: String,
    pub tx_drp: String,
    pub tx_ovr: String,
}

impl ErrorsRow {
    /// Renders the row from a snapshot.
    pub fn new(s: &CounterSnapshot) -> Self {
        Self {
            state: s.state.code().to_string(),
            rx_err: show(s, CounterField::RxErr),
            rx_drp: show(s, CounterField::RxDrp),
            rx_ovr: show(s, CounterField::RxOvr),
            tx_err: show(s, CounterField::TxErr),
            tx_drp: show(s, CounterField::TxDrp),
            tx_ovr: show(s, CounterField::TxOvr),
        }
    }
}

/// Rates of one interface.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RatesRow {
    pub state: String,
    pub rx_ok: String,
    pub rx_bps: String,
    pub rx_pps: String,
    pub rx_util: String,
    pub tx_ok: String,
    pub tx_bps: String,
    pub tx_pps: String,
    pub tx_util: String,
}

impl RatesRow {
    /// Renders the row from a snapshot.
    pub fn new(s: &CounterSnapshot) -> Self {
        Self {
            state: s.state.code().to_string(),
            rx_ok: show(s, CounterField::RxOk),
            rx_bps: byte_rate(s.rates.rx_bps),
            rx_pps: packet_rate(s.rates.rx_pps),
            rx_util: utilization(s.rates.rx_util),
            tx_ok: show(s, CounterField::TxOk),
            tx_bps: byte_rate(s.rates.tx_bps),
            tx_pps: packet_rate(s.rates.tx_pps),
            tx_util: utilization(s.rates.tx_util),
        }
    }
}

/// Trim counters of one interface.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrimRow {
    pub state: String,
    pub trim_pkts: String,
    pub trim_sent: String,
    pub trim_drp: String,
}

impl TrimRow {
    /// Renders the row from a snapshot.
    pub fn new(s: &CounterSnapshot) -> Self {
        Self {
            state: s.state.code().to_string(),
            trim_pkts: show(s, CounterField::TrimPkts),
            trim_sent: show(s, CounterField::TrimSent),
            trim_drp: show(s, CounterField::TrimDrp),
        }
    }
}

/// FEC statistics of one interface.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FecStatsRow {
    pub state: String,
    pub fec_corr: String,
    pub fec_uncorr: String,
    pub fec_symbol_err: String,
    pub fec_pre_ber: String,
    pub fec_post_ber: String,
}

impl FecStatsRow {
    /// Renders the row from a snapshot.
    pub fn new(s: &CounterSnapshot) -> Self {
        Self {
            state: s.state.code().to_string(),
            fec_corr: show(s, CounterField::FecCorr),
            fec_uncorr: show(s, CounterField::FecUncorr),
            fec_symbol_err: show(s, CounterField::FecSymbolErr),
            fec_pre_ber: ber(s.rates.fec_pre_ber),
            fec_post_ber: ber(s.rates.fec_post_ber),
        }
    }
}

/// Full statistics of a single interface.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetailedRow {
    pub trim_pkts: String,
    pub trim_sent: String,
    pub trim_drp: String,
    pub rx64: String,
    #[serde(rename = "Rx65_127")]
    pub rx65_127: String,
    #[serde(rename = "Rx128_255")]
    pub rx128_255: String,
    #[serde(rename = "Rx256_511")]
    pub rx256_511: String,
    #[serde(rename = "Rx512_1023")]
    pub rx512_1023: String,
    #[serde(rename = "Rx1024_1518")]
    pub rx1024_1518: String,
    #[serde(rename = "Rx1519_2047")]
    pub rx1519_2047: String,
    #[serde(rename = "Rx2048_4095")]
    pub rx2048_4095: String,
    #[serde(rename = "Rx4096_9216")]
    pub rx4096_9216: String,
    #[serde(rename = "Rx9217_16383")]
    pub rx9217_16383: String,
    pub tx64: String,
    #[serde(rename = "Tx65_127")]
    pub tx65_127: String,
    #[serde(rename = "Tx128_255")]
    pub tx128_255: String,
    #[serde(rename = "Tx256_511")]
    pub tx256_511: String,
    #[serde(rename = "Tx512_1023")]
    pub tx512_1023: String,
    #[serde(rename = "Tx1024_1518")]
    pub tx1024_1518: String,
    #[serde(rename = "Tx1519_2047")]
    pub tx1519_2047: String,
    #[serde(rename = "Tx2048_4095")]
    pub tx2048_4095: String,
    #[serde(rename = "Tx4096_9216")]
    pub tx4096_9216: String,
    #[serde(rename = "Tx9217_16383")]
    pub tx9217_16383: String,
    pub rx_all: String,
    pub rx_unicast: String,
    pub rx_multicast: String,
    pub rx_broadcast: String,
    pub tx_all: String,
    pub tx_unicast: String,
    pub tx_multicast: String,
    pub tx_broadcast: String,
    pub rx_jabbers: String,
    pub rx_fragments: String,
    pub rx_undersize: String,
    pub rx_overruns: String,
    pub timestamp_cleared_counters: String,
}

impl DetailedRow {
    /// Renders the row from a snapshot.
    pub fn new(s: &CounterSnapshot) -> Self {
        use CounterField::*;
        Self {
            trim_pkts: show(s, TrimPkts),
            trim_sent: show(s, TrimSent),
            trim_drp: show(s, TrimDrp),
            rx64: show(s, Rx64),
            rx65_127: show(s, Rx65_127),
            rx128_255: show(s, Rx128_255),
            rx256_511: show(s, Rx256_511),
            rx512_1023: show(s, Rx512_1023),
            rx1024_1518: show(s, Rx1024_1518),
            rx1519_2047: show(s, Rx1519_2047),
            rx2048_4095: show(s, Rx2048_4095),
            rx4096_9216: show(s, Rx4096_9216),
            rx9217_16383: show(s, Rx9217_16383),
            tx64: show(s, Tx64),
            tx65_127: show(s, Tx65_127),
            tx128_255: show(s, Tx128_255),
            tx256_511: show(s, Tx256_511),
            tx512_1023: show(s, Tx512_1023),
            tx1024_1518: show(s, Tx1024_1518),
            tx1519_2047: show(s, Tx1519_2047),
            tx2048_4095: show(s, Tx2048_4095),
            tx4096_9216: show(s, Tx4096_9216),
            tx9217_16383: show(s, Tx9217_16383),
            rx_all: show(s, RxAll),
            rx_unicast: show(s, RxUnicast),
            rx_multicast: show(s, RxMulticast),
            rx_broadcast: show(s, RxBroadcast),
            tx_all: show(s, TxAll),
            tx_unicast: show(s, TxUnicast),
            tx_multicast: show(s, TxMulticast),
            tx_broadcast: show(s, TxBroadcast),
            rx_jabbers: show(s, RxJabbers),
            rx_fragments: show(s, RxFragments),
            rx_undersize: show(s, RxUndersize),
            rx_overruns: show(s, RxOverruns),
            timestamp_cleared_counters: s.cleared_at_display().to_string(),
        }
    }
}

/// One FEC codeword-error bin.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FecBinEntry {
    pub bin_index: String,
    pub codewords: String,
}

/// Bins of the first interface in `snapshots`; empty when there is none.
pub fn fec_histogram(snapshots: &SnapshotMap) -> Vec<FecBinEntry> {
    let Some(snapshot) = snapshots.values().next() else {
        return Vec::new();
    };
    snapshot
        .fec_bins
        .iter()
        .enumerate()
        .map(|(bin, codewords)| FecBinEntry {
            bin_index: format!("BIN{}", bin),
            codewords: codewords.to_string(),
        })
        .collect()
}

/// Totals of the accumulating traffic counters across interfaces.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SummaryTotals {
    pub rx_ok: String,
    pub rx_err: String,
    pub rx_drp: String,
    pub rx_ovr: String,
    pub tx_ok: String,
    pub tx_err: String,
    pub tx_drp: String,
    pub tx_ovr: String,
}

impl SummaryTotals {
    /// Sums each counter; a total is missing if any interface lacks it.
    pub fn from_snapshots(snapshots: &SnapshotMap) -> Self {
        let total = |field: CounterField| {
            Counter::sum(snapshots.values().map(|s| s.counter(field))).to_string()
        };
        Self {
            rx_ok: total(CounterField::RxOk),
            rx_err: total(CounterField::RxErr),
            rx_drp: total(CounterField::RxDrp),
            rx_ovr: total(CounterField::RxOvr),
            tx_ok: total(CounterField::TxOk),
            tx_err: total(CounterField::TxErr),
            tx_drp: total(CounterField::TxDrp),
            tx_ovr: total(CounterField::TxOvr),
        }
    }
}

#[derive(serde::Serialize)]
struct WithSummary<V> {
    interfaces: Rows<V>,
    summary: SummaryTotals,
}

fn rows_value<V, F>(
    snapshots: &SnapshotMap,
    aliases: &AliasMap,
    mode: NamingMode,
    verbose: bool,
    row: F,
) -> Result<Value>
where
    V: Serialize,
    F: Fn(&CounterSnapshot) -> V,
{
    let interfaces = project(snapshots, aliases, mode, row);
    let value = if verbose {
        serde_json::to_value(WithSummary {
            interfaces,
            summary: SummaryTotals::from_snapshots(snapshots),
        })?
    } else {
        serde_json::to_value(interfaces)?
    };
    Ok(value)
}

/// Renders `view` of `snapshots` as JSON.
///
/// `verbose` wraps the rows as `{"interfaces": .., "summary": ..}` for the
/// views that carry totals and is ignored by the others.
pub fn render(
    view: CounterView,
    snapshots: &SnapshotMap,
    aliases: &AliasMap,
    mode: NamingMode,
    verbose: bool,
) -> Result<Value> {
    let verbose = verbose && view.supports_summary();
    match view {
        CounterView::Counters => rows_value(snapshots, aliases, mode, verbose, CountersRow::new),
        CounterView::All => rows_value(snapshots, aliases, mode, verbose, AllCountersRow::new),
        CounterView::Errors => rows_value(snapshots, aliases, mode, verbose, ErrorsRow::new),
        CounterView::Rates => rows_value(snapshots, aliases, mode, verbose, RatesRow::new),
        CounterView::Trim => rows_value(snapshots, aliases, mode, verbose, TrimRow::new),
        CounterView::FecStats => rows_value(snapshots, aliases, mode, verbose, FecStatsRow::new),
        CounterView::Detailed => rows_value(snapshots, aliases, mode, false, DetailedRow::new),
        CounterView::FecHistogram => Ok(serde_json::to_value(fec_histogram(snapshots))?),
    }
}
