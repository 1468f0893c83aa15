//! Configuration file support for the show engine
//!
//! Loads and validates engine configuration from TOML files.
//! Default location: /etc/sonic/show-telemetry.toml

use crate::error::{Result, ShowError};
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/show-telemetry.toml";

/// Redis endpoint serving one ASIC namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEndpoint {
    /// Redis host
    pub host: String,
    /// Redis port
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Redis host for the default namespace
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port for the default namespace
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Per-store database number overrides, keyed by store name (e.g. "COUNTERS_DB")
    #[serde(default)]
    pub db_numbers: BTreeMap<String, u32>,

    /// Per-store key separator overrides, keyed by store name
    #[serde(default)]
    pub separators: BTreeMap<String, String>,

    /// Endpoints for ASIC namespaces (e.g. "asic0")
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceEndpoint>,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,
}

/// Counter engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountersConfig {
    /// Counter baseline written by the portstat sampler
    #[serde(default = "default_baseline_cache_path")]
    pub baseline_cache_path: PathBuf,

    /// Longest sampling window a request may ask for
    #[serde(default = "default_max_period")]
    pub max_period_secs: u64,
}

/// Multi-ASIC topology configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Explicit ASIC count; when unset, read from `asic_conf_path`
    #[serde(default)]
    pub num_asics: Option<usize>,

    /// Platform asic.conf holding `NUM_ASIC=<n>`
    #[serde(default = "default_asic_conf_path")]
    pub asic_conf_path: PathBuf,
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Counter configuration
    #[serde(default)]
    pub counters: CountersConfig,

    /// Topology configuration
    #[serde(default)]
    pub topology: TopologyConfig,
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_baseline_cache_path() -> PathBuf {
    PathBuf::from("/tmp/cache/portstat/1000/portstat")
}

fn default_max_period() -> u64 {
    60
}

fn default_asic_conf_path() -> PathBuf {
    PathBuf::from("/usr/share/sonic/platform/asic.conf")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            db_numbers: BTreeMap::new(),
            separators: BTreeMap::new(),
            namespaces: BTreeMap::new(),
            connection_timeout_secs: default_connection_timeout(),
        }
    }
}

impl Default for CountersConfig {
    fn default() -> Self {
        Self {
            baseline_cache_path: default_baseline_cache_path(),
            max_period_secs: default_max_period(),
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            num_asics: None,
            asic_conf_path: default_asic_conf_path(),
        }
    }
}

impl DatabaseConfig {
    /// Redis database number for a store, honouring overrides.
    pub fn db_number(&self, store: Store) -> u32 {
        self.db_numbers
            .get(store.db_name())
            .copied()
            .unwrap_or_else(|| store.default_db_number())
    }

    /// Key separator for a store, honouring overrides.
    pub fn separator(&self, store: Store) -> &str {
        self.separators
            .get(store.db_name())
            .map(String::as_str)
            .unwrap_or_else(|| store.default_separator())
    }

    /// Redis endpoint for a namespace; the empty namespace is the default one.
    pub fn endpoint(&self, namespace: &str) -> Option<NamespaceEndpoint> {
        if namespace.is_empty() {
            return Some(NamespaceEndpoint {
                host: self.redis_host.clone(),
                port: self.redis_port,
            });
        }
        self.namespaces.get(namespace).cloned()
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

impl TopologyConfig {
    /// Number of ASICs on this platform.
    ///
    /// A missing or unparseable asic.conf means a single-ASIC system.
    pub fn asic_count(&self) -> usize {
        if let Some(count) = self.num_asics {
            return count;
        }
        let Ok(content) = fs::read_to_string(&self.asic_conf_path) else {
            return 1;
        };
        content
            .lines()
            .filter_map(|line| line.split_once('='))
            .find(|(key, _)| key.trim() == "NUM_ASIC")
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(1)
    }
}

impl EngineConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    ShowError::Configuration(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ShowError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Longest permitted sampling window
    pub fn max_period(&self) -> Duration {
        Duration::from_secs(self.counters.max_period_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.redis_port == 0 {
            return Err(ShowError::Configuration(
                "redis_port must be > 0".to_string(),
            ));
        }

        if self.counters.max_period_secs == 0 {
            return Err(ShowError::Configuration(
                "max_period_secs must be > 0".to_string(),
            ));
        }

        for name in self
            .database
            .db_numbers
            .keys()
            .chain(self.database.separators.keys())
        {
            if Store::from_name(name).is_none() {
                return Err(ShowError::Configuration(format!(
                    "unknown store name '{}'",
                    name
                )));
            }
        }

        for (namespace, endpoint) in &self.database.namespaces {
            if namespace.is_empty() || endpoint.port == 0 {
                return Err(ShowError::Configuration(format!(
                    "invalid endpoint for namespace '{}'",
                    namespace
                )));
            }
        }

        Ok(())
    }
}
