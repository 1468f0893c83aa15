//! show-telemetry entry point.
//!
//! Runs one show command against the local SONiC databases and prints the
//! JSON result on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sonic_show_engine::config::DEFAULT_CONFIG_PATH;
use sonic_show_engine::{dispatch, EngineConfig, RawOptions, RedisStore, ShowContext};

/// Query SONiC counters and interface state
#[derive(Parser, Debug)]
#[command(name = "show-telemetry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Take and show interface aliases instead of port names
    #[arg(long, global = true)]
    alias: bool,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interface counters
    Counters {
        /// counters, errors, rates, trim, fec-stats, fec-histogram or detailed
        #[arg(long, default_value = "counters")]
        view: String,

        /// Interface for the trim, detailed and fec-histogram views
        name: Option<String>,

        /// Restrict to these interfaces
        #[arg(short, long, value_delimiter = ',')]
        interface: Vec<String>,

        /// Report the difference over this many seconds
        #[arg(short, long)]
        period: Option<u64>,

        /// Include packet rates and trim counters
        #[arg(short = 'a', long)]
        printall: bool,

        /// Add totals across interfaces
        #[arg(short, long)]
        verbose: bool,
    },

    /// Router interface counters
    Rif {
        /// Router interface name
        name: Option<String>,

        /// Report the difference over this many seconds
        #[arg(short, long)]
        period: Option<u64>,
    },

    /// Queue counters
    Queues {
        /// Interface
        name: Option<String>,

        /// Restrict to these interfaces
        #[arg(short, long, value_delimiter = ',')]
        interfaces: Vec<String>,

        /// Omit zero counters
        #[arg(long)]
        nonzero: bool,

        /// Only trim counters
        #[arg(long, conflicts_with = "wred")]
        trim: bool,

        /// Only WRED/ECN counters
        #[arg(long)]
        wred: bool,
    },

    /// IP interfaces
    IpInterfaces {
        /// List IPv6 instead of IPv4 addresses
        #[arg(short = '6', long)]
        ipv6: bool,

        /// ASIC namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// all or frontend
        #[arg(short, long)]
        display: Option<String>,
    },
}

/// Initialize tracing/logging on stderr.
fn init_logging(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

/// Translates a subcommand into the engine's command path, positional
/// arguments and option map. Only options actually given are passed on.
fn to_request(command: Command, alias: bool) -> (String, Vec<String>, RawOptions) {
    let mut options = RawOptions::new();
    if alias {
        options.insert("namingMode", "alias");
    }
    let set_period = |options: &mut RawOptions, period: Option<u64>| {
        if let Some(period) = period {
            options.insert("period", period.to_string());
        }
    };

    match command {
        Command::Counters {
            view,
            name,
            interface,
            period,
            printall,
            verbose,
        } => {
            if !interface.is_empty() {
                options.insert("interface", interface.join(","));
            }
            set_period(&mut options, period);
            if printall {
                options.insert("printall", "true");
            }
            if verbose {
                options.insert("verbose", "true");
            }
            let path = match view.as_str() {
                "" | "counters" => "interfaces/counters".to_string(),
                other => format!("interfaces/counters/{}", other),
            };
            (path, name.into_iter().collect(), options)
        }
        Command::Rif { name, period } => {
            // RIF names are not port aliases
            options = RawOptions::new();
            set_period(&mut options, period);
            (
                "interfaces/counters/rif".to_string(),
                name.into_iter().collect(),
                options,
            )
        }
        Command::Queues {
            name,
            interfaces,
            nonzero,
            trim,
            wred,
        } => {
            if !interfaces.is_empty() {
                options.insert("interfaces", interfaces.join(","));
            }
            if nonzero {
                options.insert("nonzero", "true");
            }
            if trim {
                options.insert("trim", "true");
            }
            let path = if wred {
                "queue/wredcounters"
            } else {
                "queue/counters"
            };
            (path.to_string(), name.into_iter().collect(), options)
        }
        Command::IpInterfaces {
            ipv6,
            namespace,
            display,
        } => {
            options = RawOptions::new();
            if let Some(namespace) = namespace {
                options.insert("namespace", namespace);
            }
            if let Some(display) = display {
                options.insert("display", display);
            }
            let path = if ipv6 { "ipv6/interfaces" } else { "ip/interfaces" };
            (path.to_string(), Vec::new(), options)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = EngineConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let store = Arc::new(RedisStore::new(config.database.clone()));
    let ctx = ShowContext::new(store, config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            on_signal.cancel();
        }
    });

    let (command, positional, options) = to_request(args.command, args.alias);
    info!("Running {}", command);
    let value = dispatch(&ctx, &command, &positional, &options, &cancel)
        .await
        .with_context(|| format!("{} failed", command))?;

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
