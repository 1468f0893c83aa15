//! Request workflows and command dispatch.
//!
//! Every command follows the same shape: parse the raw options into the
//! command's typed request, translate operator names to canonical ones,
//! sample (twice when a window is requested), and render JSON.

use crate::context::ShowContext;
use crate::counters::views::{self, CounterView};
use crate::counters::{CounterSnapshotEngine, SnapshotMap};
use crate::diff::{self, sample_with_window};
use crate::error::{Result, ShowError};
use crate::ip_interfaces::{ip_interfaces, AddressFamily};
use crate::options::{
    parse_ip_interfaces_request, parse_queue_request, parse_rif_request, CounterRequest,
    RawOptions,
};
use crate::queues::{queue_counters, QueueView};
use crate::rif::rif_counters;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const INTERFACE_COUNTERS: &str = "interfaces/counters";
const RIF_VIEW: &str = "rif";

/// Interface counters of one view, windowed per the request.
pub async fn interface_counters(
    ctx: &ShowContext,
    request: &CounterRequest,
    cancel: &CancellationToken,
) -> Result<Value> {
    let aliases = ctx.alias_map().await?;
    let names = request
        .interfaces
        .iter()
        .map(|name| aliases.to_canonical(name, request.naming))
        .collect::<Result<Vec<_>>>()?;

    let engine = CounterSnapshotEngine::new(ctx);
    let snapshots: SnapshotMap = sample_with_window(
        request.window,
        cancel,
        || engine.snapshot(&names),
        diff::diff,
    )
    .await?;

    if request.view.requires_interface() && snapshots.is_empty() {
        return Err(ShowError::NotFound(format!(
            "no counters for interface {}",
            request.interfaces.join(",")
        )));
    }
    views::render(request.view, &snapshots, &aliases, request.naming, request.verbose)
}

/// Runs `command` with positional `args` and raw `options`.
///
/// Commands: `interfaces/counters[/<view>]`, `interfaces/counters/rif`,
/// `queue/counters`, `queue/wredcounters`, `ip/interfaces` and
/// `ipv6/interfaces`.
pub async fn dispatch(
    ctx: &ShowContext,
    command: &str,
    args: &[String],
    options: &RawOptions,
    cancel: &CancellationToken,
) -> Result<Value> {
    let command = command.trim_matches('/');
    info!("Handling {} args={:?} options={:?}", command, args, options);
    let max_period = ctx.max_period();

    if let Some(rest) = command.strip_prefix(INTERFACE_COUNTERS) {
        let view = rest.trim_start_matches('/');
        if view == RIF_VIEW {
            let request = parse_rif_request(args, options, max_period)?;
            let rows = rif_counters(ctx, &request, cancel).await?;
            return Ok(serde_json::to_value(rows)?);
        }
        if !rest.is_empty() && !rest.starts_with('/') {
            return Err(unknown_command(command));
        }
        let view = CounterView::from_name(view)?;
        let request = CounterRequest::parse(view, args, options, max_period)?;
        debug!("Interface counter request {:?}", request);
        return interface_counters(ctx, &request, cancel).await;
    }

    match command {
        "queue/counters" | "queue/wredcounters" => {
            let view = if command == "queue/wredcounters" {
                QueueView::Wred
            } else {
                QueueView::All
            };
            let mut request = parse_queue_request(view, args, options)?;
            let naming = options.naming_mode();
            let aliases = ctx.alias_map().await?;
            request.interfaces = request
                .interfaces
                .iter()
                .map(|name| aliases.to_canonical(name, naming))
                .collect::<Result<Vec<_>>>()?;
            let rows = queue_counters(ctx, &request, naming).await?;
            Ok(serde_json::to_value(rows)?)
        }
        "ip/interfaces" | "ipv6/interfaces" => {
            let family = if command.starts_with("ipv6") {
                AddressFamily::Ipv6
            } else {
                AddressFamily::Ipv4
            };
            let request = parse_ip_interfaces_request(family, options)?;
            let interfaces = ip_interfaces(ctx, &request).await?;
            Ok(serde_json::to_value(interfaces)?)
        }
        _ => Err(unknown_command(command)),
    }
}

fn unknown_command(command: &str) -> ShowError {
    ShowError::invalid(format!("unknown command '{}'", command))
}
