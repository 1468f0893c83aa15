//! Interface counter model.
//!
//! A [`CounterSnapshot`] holds typed values: accumulating counters are
//! [`Counter`]s (present or missing), rates are plain `Option<f64>`, and the
//! link state is an enum. Rendering to display strings happens only in
//! [`format`] and [`views`].

pub mod format;
pub mod snapshot;
pub mod views;

pub use self::snapshot::CounterSnapshotEngine;

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Display form of a value with no source data.
pub const MISSING_VALUE: &str = "N/A";

/// Display form of "counters never cleared".
pub const DEFAULT_CLEARED_AT: &str = "None";

/// Number of FEC codeword-error bins per interface.
pub const FEC_BIN_COUNT: usize = 16;

const FEC_BIN_FIELD_PREFIX: &str = "SAI_PORT_STAT_IF_IN_FEC_CODEWORD_ERRORS_S";

/// Snapshots keyed by canonical interface name.
pub type SnapshotMap = BTreeMap<String, CounterSnapshot>;

/// An accumulating counter value.
///
/// Values read from a store are never negative; only an unclamped
/// difference can be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Counter {
    Present(i64),
    #[default]
    Missing,
}

impl Counter {
    /// Parses a store value; anything but a non-negative integer is missing.
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(n) if n >= 0 => Counter::Present(n),
            _ => Counter::Missing,
        }
    }

    /// Sum of several values; missing if any part is missing.
    pub fn sum<I: IntoIterator<Item = Counter>>(parts: I) -> Self {
        let mut total: i64 = 0;
        for part in parts {
            match part {
                Counter::Present(n) => match total.checked_add(n) {
                    Some(t) => total = t,
                    None => return Counter::Missing,
                },
                Counter::Missing => return Counter::Missing,
            }
        }
        Counter::Present(total)
    }

    /// The value, if present.
    pub fn value(&self) -> Option<i64> {
        match self {
            Counter::Present(n) => Some(*n),
            Counter::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Counter::Missing)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counter::Present(n) => write!(f, "{}", n),
            Counter::Missing => f.write_str(MISSING_VALUE),
        }
    }
}

impl Serialize for Counter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Declares every accumulating counter together with its baseline key, its
/// SAI source fields (summed when more than one) and whether a negative
/// difference is clamped to zero.
macro_rules! counter_fields {
    ($($variant:ident => $cache:expr, [$($source:literal),+], $clamp:literal;)+) => {
        /// Accumulating per-interface counters.
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum CounterField {
            $($variant,)+
        }

        impl CounterField {
            /// Every counter, in declaration order.
            pub const ALL: &'static [CounterField] = &[$(CounterField::$variant,)+];

            /// Display name, e.g. `RxOk`.
            pub fn name(self) -> &'static str {
                match self {
                    $(CounterField::$variant => stringify!($variant),)+
                }
            }

            /// Key in the portstat baseline file; `None` if it is not persisted.
            pub fn cache_key(self) -> Option<&'static str> {
                match self {
                    $(CounterField::$variant => $cache,)+
                }
            }

            /// SAI stat fields making up this counter.
            pub fn sources(self) -> &'static [&'static str] {
                match self {
                    $(CounterField::$variant => &[$($source),+],)+
                }
            }

            /// Whether a negative difference is reported as zero.
            pub fn clamps(self) -> bool {
                match self {
                    $(CounterField::$variant => $clamp,)+
                }
            }
        }
    };
}

counter_fields! {
    RxOk => Some("rx_ok"), ["SAI_PORT_STAT_IF_IN_UCAST_PKTS", "SAI_PORT_STAT_IF_IN_NON_UCAST_PKTS"], true;
    RxErr => Some("rx_err"), ["SAI_PORT_STAT_IF_IN_ERRORS"], true;
    RxDrp => Some("rx_drop"), ["SAI_PORT_STAT_IF_IN_DISCARDS"], true;
    RxOvr => Some("rx_ovr"), ["SAI_PORT_STAT_ETHER_RX_OVERSIZE_PKTS"], true;
    TxOk => Some("tx_ok"), ["SAI_PORT_STAT_IF_OUT_UCAST_PKTS", "SAI_PORT_STAT_IF_OUT_NON_UCAST_PKTS"], true;
    TxErr => Some("tx_err"), ["SAI_PORT_STAT_IF_OUT_ERRORS"], true;
    TxDrp => Some("tx_drop"), ["SAI_PORT_STAT_IF_OUT_DISCARDS"], true;
    TxOvr => Some("tx_ovr"), ["SAI_PORT_STAT_ETHER_TX_OVERSIZE_PKTS"], true;
    FecCorr => Some("fec_corr"), ["SAI_PORT_STAT_IF_IN_FEC_CORRECTABLE_FRAMES"], true;
    FecUncorr => Some("fec_uncorr"), ["SAI_PORT_STAT_IF_IN_FEC_NOT_CORRECTABLE_FRAMES"], true;
    FecSymbolErr => Some("fec_symbol_err"), ["SAI_PORT_STAT_IF_IN_FEC_SYMBOL_ERRORS"], true;
    TrimPkts => Some("trim"), ["SAI_PORT_STAT_TRIM_PKTS"], true;
    TrimSent => None, ["SAI_PORT_STAT_TX_TRIM_SENT_PKTS"], true;
    TrimDrp => None, ["SAI_PORT_STAT_DROPPED_TRIM_PKTS"], false;
    Rx64 => Some("rx_64"), ["SAI_PORT_STAT_ETHER_IN_PKTS_64_OCTETS"], true;
    Rx65_127 => Some("rx_65_127"), ["SAI_PORT_STAT_ETHER_IN_PKTS_65_TO_127_OCTETS"], true;
    Rx128_255 => Some("rx_128_255"), ["SAI_PORT_STAT_ETHER_IN_PKTS_128_TO_255_OCTETS"], true;
    Rx256_511 => Some("rx_256_511"), ["SAI_PORT_STAT_ETHER_IN_PKTS_256_TO_511_OCTETS"], true;
    Rx512_1023 => Some("rx_512_1023"), ["SAI_PORT_STAT_ETHER_IN_PKTS_512_TO_1023_OCTETS"], true;
    Rx1024_1518 => Some("rx_1024_1518"), ["SAI_PORT_STAT_ETHER_IN_PKTS_1024_TO_1518_OCTETS"], true;
    Rx1519_2047 => Some("rx_1519_2047"), ["SAI_PORT_STAT_ETHER_IN_PKTS_1519_TO_2047_OCTETS"], true;
    Rx2048_4095 => Some("rx_2048_4095"), ["SAI_PORT_STAT_ETHER_IN_PKTS_2048_TO_4095_OCTETS"], true;
    Rx4096_9216 => Some("rx_4096_9216"), ["SAI_PORT_STAT_ETHER_IN_PKTS_4096_TO_9216_OCTETS"], true;
    Rx9217_16383 => Some("rx_9217_16383"), ["SAI_PORT_STAT_ETHER_IN_PKTS_9217_TO_16383_OCTETS"], true;
    Tx64 => Some("tx_64"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_64_OCTETS"], true;
    Tx65_127 => Some("tx_65_127"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_65_TO_127_OCTETS"], true;
    Tx128_255 => Some("tx_128_255"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_128_TO_255_OCTETS"], true;
    Tx256_511 => Some("tx_256_511"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_256_TO_511_OCTETS"], true;
    Tx512_1023 => Some("tx_512_1023"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_512_TO_1023_OCTETS"], true;
    Tx1024_1518 => Some("tx_1024_1518"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_1024_TO_1518_OCTETS"], true;
    Tx1519_2047 => Some("tx_1519_2047"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_1519_TO_2047_OCTETS"], true;
    Tx2048_4095 => Some("tx_2048_4095"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_2048_TO_4095_OCTETS"], true;
    Tx4096_9216 => Some("tx_4096_9216"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_4096_TO_9216_OCTETS"], true;
    Tx9217_16383 => Some("tx_9217_16383"), ["SAI_PORT_STAT_ETHER_OUT_PKTS_9217_TO_16383_OCTETS"], true;
    RxAll => Some("rx_all"), ["SAI_PORT_STAT_IF_IN_UCAST_PKTS", "SAI_PORT_STAT_IF_IN_MULTICAST_PKTS", "SAI_PORT_STAT_IF_IN_BROADCAST_PKTS"], true;
    RxUnicast => Some("rx_uca"), ["SAI_PORT_STAT_IF_IN_UCAST_PKTS"], true;
    RxMulticast => Some("rx_mca"), ["SAI_PORT_STAT_IF_IN_MULTICAST_PKTS"], true;
    RxBroadcast => Some("rx_bca"), ["SAI_PORT_STAT_IF_IN_BROADCAST_PKTS"], true;
    TxAll => Some("tx_all"), ["SAI_PORT_STAT_IF_OUT_UCAST_PKTS", "SAI_PORT_STAT_IF_OUT_MULTICAST_PKTS", "SAI_PORT_STAT_IF_OUT_BROADCAST_PKTS"], true;
    TxUnicast => Some("tx_uca"), ["SAI_PORT_STAT_IF_OUT_UCAST_PKTS"], true;
    TxMulticast => Some("tx_mca"), ["SAI_PORT_STAT_IF_OUT_MULTICAST_PKTS"], true;
    TxBroadcast => Some("tx_bca"), ["SAI_PORT_STAT_IF_OUT_BROADCAST_PKTS"], true;
    RxJabbers => Some("rx_jbr"), ["SAI_PORT_STAT_ETHER_STATS_JABBERS"], true;
    RxFragments => Some("rx_frag"), ["SAI_PORT_STAT_ETHER_STATS_FRAGMENTS"], true;
    RxUndersize => Some("rx_usize"), ["SAI_PORT_STAT_ETHER_STATS_UNDERSIZE_PKTS"], true;
    RxOverruns => Some("rx_ovrrun"), ["SAI_PORT_STAT_IP_IN_RECEIVES"], true;
}

/// Administrative/operational state of a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
    #[default]
    AdminDown,
}

impl LinkState {
    /// `Up` iff admin and oper are up, `Down` iff admin is up and oper down.
    pub fn from_status(admin: Option<&str>, oper: Option<&str>) -> Self {
        match (admin, oper) {
            (Some("up"), Some("up")) => LinkState::Up,
            (Some("up"), Some("down")) => LinkState::Down,
            _ => LinkState::AdminDown,
        }
    }

    /// One-letter code used in counter tables.
    pub fn code(&self) -> &'static str {
        match self {
            LinkState::Up => "U",
            LinkState::Down => "D",
            LinkState::AdminDown => "X",
        }
    }
}

/// Instantaneous measurements; never diffed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    /// Bytes per second
    pub rx_bps: Option<f64>,
    pub tx_bps: Option<f64>,
    /// Packets per second
    pub rx_pps: Option<f64>,
    pub tx_pps: Option<f64>,
    /// Utilization in percent
    pub rx_util: Option<f64>,
    pub tx_util: Option<f64>,
    pub fec_pre_ber: Option<f64>,
    pub fec_post_ber: Option<f64>,
}

/// SAI field of a FEC codeword-error bin.
pub fn fec_bin_field(bin: usize) -> String {
    format!("{}{}", FEC_BIN_FIELD_PREFIX, bin)
}

/// Point-in-time counters of one interface.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    pub state: LinkState,
    pub counters: BTreeMap<CounterField, Counter>,
    pub rates: Rates,
    pub fec_bins: [Counter; FEC_BIN_COUNT],
    /// When counters were last cleared; `None` if never.
    pub cleared_at: Option<String>,
}

impl Default for CounterSnapshot {
    fn default() -> Self {
        Self {
            state: LinkState::default(),
            counters: BTreeMap::new(),
            rates: Rates::default(),
            fec_bins: [Counter::Present(0); FEC_BIN_COUNT],
            cleared_at: None,
        }
    }
}

impl CounterSnapshot {
    /// Value of a counter; missing if never set.
    pub fn counter(&self, field: CounterField) -> Counter {
        self.counters.get(&field).copied().unwrap_or_default()
    }

    /// Sets a counter.
    pub fn set(&mut self, field: CounterField, value: Counter) {
        self.counters.insert(field, value);
    }

    /// Cleared-at marker as displayed.
    pub fn cleared_at_display(&self) -> &str {
        self.cleared_at.as_deref().unwrap_or(DEFAULT_CLEARED_AT)
    }
}
