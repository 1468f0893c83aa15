//! Counter baseline written by the portstat sampler.
//!
//! The file is a JSON object keyed by interface name plus a reserved `time`
//! key holding the moment counters were last cleared. The sampler rewrites
//! it out of process, so a missing, empty, truncated or otherwise
//! unparseable file simply means "no baseline".

use crate::counters::{Counter, CounterField, CounterSnapshot, SnapshotMap};
use crate::diff;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

const TIME_KEY: &str = "time";

/// Counters at the last explicit clear.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    /// Clearance timestamp, if recorded.
    pub cleared_at: Option<String>,
    /// Per-interface counters; each entry carries `cleared_at`.
    pub interfaces: SnapshotMap,
}

impl Baseline {
    /// Reads the baseline file; `None` when it is absent or unusable.
    pub async fn load(path: &Path) -> Option<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No counter baseline at {}: {}", path.display(), e);
                return None;
            }
        };
        let baseline = Self::parse(&content);
        if baseline.is_none() {
            debug!("Ignoring unusable counter baseline at {}", path.display());
        }
        baseline
    }

    /// Parses baseline JSON; `None` if nothing usable is in it.
    pub fn parse(content: &str) -> Option<Self> {
        if content.trim().is_empty() {
            return None;
        }
        let mut root: Map<String, Value> = serde_json::from_str(content).ok()?;

        let cleared_at = root
            .remove(TIME_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|ts| !ts.is_empty());

        let mut interfaces = SnapshotMap::new();
        for (name, entry) in root {
            match parse_entry(&entry) {
                Some(mut snapshot) => {
                    snapshot.cleared_at = cleared_at.clone();
                    interfaces.insert(name, snapshot);
                }
                None => warn!("Skipping malformed baseline entry for {}", name),
            }
        }

        if interfaces.is_empty() {
            return None;
        }
        Some(Self {
            cleared_at,
            interfaces,
        })
    }

    /// Re-expresses a fresh snapshot relative to this baseline and stamps
    /// the clearance time on every entry, including interfaces the baseline
    /// does not know.
    pub fn correct(&self, fresh: &SnapshotMap) -> SnapshotMap {
        let mut corrected = diff::diff(&self.interfaces, fresh);
        if let Some(cleared_at) = &self.cleared_at {
            for snapshot in corrected.values_mut() {
                snapshot.cleared_at = Some(cleared_at.clone());
            }
        }
        corrected
    }
}

fn parse_entry(entry: &Value) -> Option<CounterSnapshot> {
    let fields = entry.as_object()?;
    let mut snapshot = CounterSnapshot::default();
    for &field in CounterField::ALL {
        let Some(key) = field.cache_key() else {
            continue;
        };
        let value = match fields.get(key) {
            None | Some(Value::Null) => Counter::Missing,
            Some(Value::String(s)) => Counter::parse(s),
            Some(Value::Number(n)) => n.as_i64().map(Counter::Present).unwrap_or_default(),
            Some(_) => return None,
        };
        snapshot.set(field, value);
    }
    Some(snapshot)
}
