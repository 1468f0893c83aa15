//! Per-queue counters.

use crate::context::ShowContext;
use crate::counters::views::Rows;
use crate::counters::MISSING_VALUE;
use crate::error::Result;
use crate::naming::{natural_cmp, NamingMode};
use crate::query::{Query, Row};
use crate::store::Store;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Suffix of the periodic watermark rows sharing the queue table.
const PERIODIC_SUFFIX: &str = "periodic";

/// Field groups a queue request can ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueView {
    #[default]
    All,
    Trim,
    Wred,
}

impl QueueView {
    fn includes(self, group: FieldGroup) -> bool {
        match self {
            QueueView::All => true,
            QueueView::Trim => group == FieldGroup::Trim,
            QueueView::Wred => group == FieldGroup::Wred,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldGroup {
    Traffic,
    Trim,
    Wred,
}

/// Counters of one queue. Fields outside the requested view, and with
/// `nonzero` fields that are zero or unreadable, are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounters {
    #[serde(rename = "Counter/pkts", skip_serializing_if = "Option::is_none")]
    pub packets: Option<String>,
    #[serde(rename = "Counter/bytes", skip_serializing_if = "Option::is_none")]
    pub bytes: Option<String>,
    #[serde(rename = "Drop/pkts", skip_serializing_if = "Option::is_none")]
    pub dropped_packets: Option<String>,
    #[serde(rename = "Drop/bytes", skip_serializing_if = "Option::is_none")]
    pub dropped_bytes: Option<String>,
    #[serde(rename = "Trim/pkts", skip_serializing_if = "Option::is_none")]
    pub trimmed_packets: Option<String>,
    #[serde(rename = "TrimSent/pkts", skip_serializing_if = "Option::is_none")]
    pub trimmed_sent_packets: Option<String>,
    #[serde(rename = "TrimDrop/pkts", skip_serializing_if = "Option::is_none")]
    pub trimmed_dropped_packets: Option<String>,
    #[serde(rename = "WredDrp/pkts", skip_serializing_if = "Option::is_none")]
    pub wred_dropped_packets: Option<String>,
    #[serde(rename = "WredDrp/bytes", skip_serializing_if = "Option::is_none")]
    pub wred_dropped_bytes: Option<String>,
    #[serde(rename = "EcnMarked/pkts", skip_serializing_if = "Option::is_none")]
    pub ecn_marked_packets: Option<String>,
    #[serde(rename = "EcnMarked/bytes", skip_serializing_if = "Option::is_none")]
    pub ecn_marked_bytes: Option<String>,
}

impl QueueCounters {
    fn from_row(row: &Row, view: QueueView, nonzero: bool) -> Self {
        use FieldGroup::*;
        let pick = |group: FieldGroup, field: &str| -> Option<String> {
            if !view.includes(group) {
                return None;
            }
            let raw = row.get(field).map(|v| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            });
            if nonzero {
                raw.filter(|v| v.trim().parse::<i64>().is_ok_and(|n| n != 0))
            } else {
                Some(raw.unwrap_or_else(|| MISSING_VALUE.to_string()))
            }
        };
        Self {
            packets: pick(Traffic, "SAI_QUEUE_STAT_PACKETS"),
            bytes: pick(Traffic, "SAI_QUEUE_STAT_BYTES"),
            dropped_packets: pick(Traffic, "SAI_QUEUE_STAT_DROPPED_PACKETS"),
            dropped_bytes: pick(Traffic, "SAI_QUEUE_STAT_DROPPED_BYTES"),
            trimmed_packets: pick(Trim, "SAI_QUEUE_STAT_TRIM_PACKETS"),
            trimmed_sent_packets: pick(Trim, "SAI_QUEUE_STAT_TX_TRIM_PACKETS"),
            trimmed_dropped_packets: pick(Trim, "SAI_QUEUE_STAT_DROPPED_TRIM_PACKETS"),
            wred_dropped_packets: pick(Wred, "SAI_QUEUE_STAT_WRED_DROPPED_PACKETS"),
            wred_dropped_bytes: pick(Wred, "SAI_QUEUE_STAT_WRED_DROPPED_BYTES"),
            ecn_marked_packets: pick(Wred, "SAI_QUEUE_STAT_WRED_ECN_MARKED_PACKETS"),
            ecn_marked_bytes: pick(Wred, "SAI_QUEUE_STAT_WRED_ECN_MARKED_BYTES"),
        }
    }
}

/// Parameters of a queue counter request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueRequest {
    /// Canonical port names; every `Ethernet*` port when empty.
    pub interfaces: Vec<String>,
    pub nonzero: bool,
    pub view: QueueView,
}

/// Queue counters keyed `<port><sep><index>`, ports shown per `mode`.
pub async fn queue_counters(
    ctx: &ShowContext,
    request: &QueueRequest,
    mode: NamingMode,
) -> Result<Rows<QueueCounters>> {
    let ports: Vec<&str> = if request.interfaces.is_empty() {
        vec!["Ethernet*"]
    } else {
        request.interfaces.iter().map(String::as_str).collect()
    };
    let queries = ports
        .iter()
        .map(|port| Query::new(["COUNTERS_DB", "COUNTERS", *port, "Queues"]))
        .collect::<Result<Vec<_>>>()?;

    let raw = ctx.resolver().resolve(&queries).await.map_err(|e| {
        error!("Unable to get queue counters for {:?}: {}", ports, e);
        e
    })?;

    let sep = ctx.separator(Store::Counters).to_string();
    let aliases = ctx.alias_map().await?;
    let queues = aliases.remap_composite_keys_to_canonical(raw, &sep);

    let mut rows = Vec::with_capacity(queues.len());
    for (queue, counters) in queues {
        if queue.ends_with(PERIODIC_SUFFIX) {
            continue;
        }
        let Some(fields) = counters.as_object() else {
            warn!("Ignoring invalid counters for the queue '{}': {}", queue, counters);
            continue;
        };
        let shown = match queue.split_once(sep.as_str()) {
            Some((port, index)) => format!("{}{}{}", aliases.display_name(port, mode), sep, index),
            None => queue.clone(),
        };
        rows.push((
            queue,
            shown,
            QueueCounters::from_row(fields, request.view, request.nonzero),
        ));
    }
    rows.sort_by(|(a, _, _), (b, _, _)| natural_cmp(a, b));
    debug!("Collected counters for {} queues", rows.len());

    Ok(Rows(
        rows.into_iter()
            .map(|(_, shown, counters)| (shown, counters))
            .collect(),
    ))
}
