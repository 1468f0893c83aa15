//! Telemetry query and counter-diffing engine for SONiC show commands.
//!
//! The engine answers structured "show" requests by reading CONFIG_DB,
//! STATE_DB, COUNTERS_DB and APPL_DB (per ASIC namespace) and returning a
//! consistent, optionally time-windowed snapshot as JSON:
//!
//! - [`query`]: `[store, table, key1?, key2?, field?]` tuples resolved to
//!   merged row maps, including the name-to-oid counter indirections
//! - [`naming`]: canonical port names vs operator aliases
//! - [`counters`]: per-interface counter snapshots and their views
//! - [`diff`]: clamped counter differencing and the sampling window
//! - [`baseline`]: "since last clear" correction from the portstat cache
//! - [`topology`]: multi-ASIC namespace discovery and result merging
//! - [`rif`], [`queues`], [`ip_interfaces`]: the remaining commands
//! - [`service`]: option parsing and command dispatch
//!
//! # Example
//!
//! ```ignore
//! use sonic_show_engine::{dispatch, EngineConfig, RawOptions, RedisStore, ShowContext};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = EngineConfig::load()?;
//! let store = Arc::new(RedisStore::new(config.database.clone()));
//! let ctx = ShowContext::new(store, config);
//! let options = RawOptions::new().with("period", "5");
//! let json = dispatch(&ctx, "interfaces/counters/errors", &[], &options, &CancellationToken::new()).await?;
//! ```

pub mod baseline;
pub mod config;
pub mod context;
pub mod counters;
pub mod diff;
pub mod error;
pub mod ip_interfaces;
pub mod naming;
pub mod options;
pub mod query;
pub mod queues;
pub mod rif;
pub mod service;
pub mod store;
pub mod topology;

pub use config::EngineConfig;
pub use context::ShowContext;
pub use error::{ErrorClass, Result, ShowError};
pub use naming::{AliasMap, NamingMode};
pub use options::RawOptions;
pub use query::{DataMap, Query, QueryResolver};
pub use service::dispatch;
pub use store::{MemoryStore, RedisStore, Store, StoreBackend, StoreTarget};
pub use topology::NamespaceRoleSet;
