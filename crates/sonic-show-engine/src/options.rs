//! Request options.
//!
//! Callers hand over a flat string map; each command parses it once into
//! its own typed request, rejecting options it does not recognise. `redact`
//! belongs to the caller and is accepted everywhere.

use crate::counters::views::CounterView;
use crate::diff::SampleWindow;
use crate::error::{Result, ShowError};
use crate::ip_interfaces::{AddressFamily, DisplayMode, IpInterfacesRequest};
use crate::naming::NamingMode;
use crate::queues::{QueueRequest, QueueView};
use crate::rif::RifRequest;
use std::collections::BTreeMap;
use std::time::Duration;

pub const OPT_INTERFACE: &str = "interface";
pub const OPT_INTERFACES: &str = "interfaces";
pub const OPT_PERIOD: &str = "period";
pub const OPT_PRINTALL: &str = "printall";
pub const OPT_VERBOSE: &str = "verbose";
pub const OPT_NAMING_MODE: &str = "namingMode";
pub const OPT_NAMESPACE: &str = "namespace";
pub const OPT_DISPLAY: &str = "display";
pub const OPT_NONZERO: &str = "nonzero";
pub const OPT_TRIM: &str = "trim";
pub const OPT_REDACT: &str = "redact";

/// Untyped option map as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOptions(BTreeMap<String, String>);

impl RawOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option, replacing any earlier value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Boolean option; accepts `true/false/1/0` in any case.
    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(ShowError::invalid(format!(
                "option {} must be a boolean, got '{}'",
                key, raw
            ))),
        }
    }

    /// Comma-separated list option; blank items are dropped.
    pub fn strings(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Naming mode requested with the options.
    pub fn naming_mode(&self) -> NamingMode {
        NamingMode::from_option(self.get(OPT_NAMING_MODE))
    }

    /// Fails on the first option `command` does not accept.
    pub fn ensure_only(&self, command: &str, allowed: &[&str]) -> Result<()> {
        match self
            .0
            .keys()
            .find(|key| key.as_str() != OPT_REDACT && !allowed.contains(&key.as_str()))
        {
            Some(key) => Err(ShowError::invalid(format!(
                "unsupported option '{}' for {}",
                key, command
            ))),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// First positional argument, if non-empty.
fn first_arg(args: &[String]) -> Option<&str> {
    args.first().map(String::as_str).filter(|s| !s.trim().is_empty())
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

/// Typed interface-counter request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRequest {
    pub view: CounterView,
    /// Names as typed by the operator; all interfaces when empty.
    pub interfaces: Vec<String>,
    pub window: SampleWindow,
    pub verbose: bool,
    pub naming: NamingMode,
}

impl CounterRequest {
    /// Parses the options of `view`.
    ///
    /// The default view takes `interface`/`interfaces` and `printall`; the
    /// trim, detailed and histogram views take one positional interface.
    pub fn parse(
        view: CounterView,
        args: &[String],
        options: &RawOptions,
        max_period: Duration,
    ) -> Result<Self> {
        let command = format!("counters view {:?}", view);
        let mut view = view;
        let mut interfaces = Vec::new();

        match view {
            CounterView::Counters | CounterView::All => {
                options.ensure_only(
                    &command,
                    &[OPT_INTERFACE, OPT_INTERFACES, OPT_PRINTALL, OPT_PERIOD, OPT_VERBOSE, OPT_NAMING_MODE],
                )?;
                for key in [OPT_INTERFACE, OPT_INTERFACES] {
                    interfaces.extend(options.strings(key).unwrap_or_default());
                }
                if options.bool(OPT_PRINTALL)?.unwrap_or(false) {
                    view = CounterView::All;
                }
            }
            CounterView::Errors | CounterView::Rates | CounterView::FecStats => {
                options.ensure_only(&command, &[OPT_PERIOD, OPT_VERBOSE, OPT_NAMING_MODE])?;
            }
            CounterView::Trim => {
                options.ensure_only(&command, &[OPT_PERIOD, OPT_VERBOSE, OPT_NAMING_MODE])?;
                interfaces.extend(first_arg(args).map(str::to_string));
            }
            CounterView::Detailed => {
                options.ensure_only(&command, &[OPT_PERIOD, OPT_NAMING_MODE])?;
            }
            CounterView::FecHistogram => {
                options.ensure_only(&command, &[OPT_NAMING_MODE])?;
            }
        }

        if view.requires_interface() {
            let name = first_arg(args)
                .ok_or_else(|| ShowError::invalid("No interface name passed"))?;
            interfaces.push(name.to_string());
        }

        let window = if view.supports_window() {
            SampleWindow::parse(options.get(OPT_PERIOD), max_period)?
        } else {
            SampleWindow::immediate()
        };

        Ok(Self {
            view,
            interfaces: dedup(interfaces),
            window,
            verbose: options.bool(OPT_VERBOSE)?.unwrap_or(false),
            naming: options.naming_mode(),
        })
    }
}

/// Parses a router-interface counter request: one optional positional
/// interface and `period`.
pub fn parse_rif_request(
    args: &[String],
    options: &RawOptions,
    max_period: Duration,
) -> Result<RifRequest> {
    options.ensure_only("counters/rif", &[OPT_PERIOD])?;
    Ok(RifRequest {
        interface: first_arg(args).map(str::to_string),
        window: SampleWindow::parse(options.get(OPT_PERIOD), max_period)?,
    })
}

/// Parses a queue counter request. Interfaces come from `interfaces` plus
/// the positional argument, de-duplicated; `trim` only applies to `All`.
pub fn parse_queue_request(
    view: QueueView,
    args: &[String],
    options: &RawOptions,
) -> Result<QueueRequest> {
    let allowed: &[&str] = match view {
        QueueView::Wred => &[OPT_INTERFACES, OPT_NONZERO, OPT_NAMING_MODE],
        _ => &[OPT_INTERFACES, OPT_NONZERO, OPT_TRIM, OPT_NAMING_MODE],
    };
    options.ensure_only("queue/counters", allowed)?;

    let mut interfaces = options.strings(OPT_INTERFACES).unwrap_or_default();
    interfaces.extend(first_arg(args).map(str::to_string));

    let view = if view == QueueView::All && options.bool(OPT_TRIM)?.unwrap_or(false) {
        QueueView::Trim
    } else {
        view
    };
    Ok(QueueRequest {
        interfaces: dedup(interfaces),
        nonzero: options.bool(OPT_NONZERO)?.unwrap_or(false),
        view,
    })
}

/// Parses an IP interface listing request.
pub fn parse_ip_interfaces_request(
    family: AddressFamily,
    options: &RawOptions,
) -> Result<IpInterfacesRequest> {
    options.ensure_only("ip/interfaces", &[OPT_NAMESPACE, OPT_DISPLAY])?;
    let namespace = options
        .get(OPT_NAMESPACE)
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty());
    let display = options.get(OPT_DISPLAY).map(DisplayMode::parse).transpose()?;
    Ok(IpInterfacesRequest {
        family,
        namespace,
        display,
    })
}
