//! svsorch entry point.
//!
//! Loads the SVS configuration, then either prints the resulting state
//! (`--dump`, `--resolve`) or keeps serving until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use svs_orch::audit::init_logging;
use svs_orch::daemon::{SvsConfig, SvsDaemon, SvsDaemonConfig};
use svs_orch::intfs::IntfsOrchConfig;
use svs_orch::svs::SvsOrchConfig;
use tracing::{error, info};

/// Source-based VRF selection daemon
#[derive(Parser, Debug)]
#[command(name = "svsorch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file with interfaces, SVS tables and bindings
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Interface slots reserved per address family for the lookup path
    #[arg(long, default_value_t = SvsOrchConfig::DEFAULT_MAX_INTERFACES)]
    max_interfaces: usize,

    /// Accept SVS bindings on admin-down interfaces
    #[arg(long)]
    allow_admin_down: bool,

    /// Print the state as JSON and exit
    #[arg(long)]
    dump: bool,

    /// Print the table selected for <interface>:<address> and exit (repeatable)
    #[arg(long, value_name = "INTERFACE:ADDRESS")]
    resolve: Vec<String>,
}

fn run(args: Args) -> anyhow::Result<Option<SvsDaemon>> {
    let mut daemon = SvsDaemon::new(SvsDaemonConfig {
        svs: SvsOrchConfig::new(args.max_interfaces),
        intfs: IntfsOrchConfig {
            allow_admin_down: args.allow_admin_down,
        },
    });

    if let Some(path) = &args.config {
        let config = SvsConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?;
        daemon
            .apply_config(&config)
            .with_context(|| format!("applying {}", path.display()))?;
    }

    for query in &args.resolve {
        let resolution = daemon.resolve(query)?;
        println!("{}", serde_json::to_string(&resolution)?);
    }
    if args.dump {
        println!("{}", serde_json::to_string_pretty(&daemon.dump())?);
    }

    if args.dump || !args.resolve.is_empty() {
        return Ok(None);
    }
    Ok(Some(daemon))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json);

    info!("Starting svsorch");
    let daemon = match run(args) {
        Ok(Some(daemon)) => daemon,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    daemon
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    info!("svsorch stopped");
    ExitCode::SUCCESS
}
