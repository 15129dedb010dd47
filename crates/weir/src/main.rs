//! Weir - streaming data-processing pipeline runtime
//!
//! # Usage
//!
//! ```bash
//! # Run a topology
//! weir topology.toml
//!
//! # Cluster node with peer forwarding
//! weir topology.toml --peer-listen 0.0.0.0:4910 --peer node-b:4910 --peer node-c:4910
//! ```

mod run;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Weir - streaming data-processing pipeline runtime
#[derive(Parser, Debug)]
#[command(name = "weir")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the topology document
    topology: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Grace period for draining buffers at shutdown
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    grace: Duration,

    /// Address to listen on for peer forwarding (enables cluster mode)
    #[arg(long)]
    peer_listen: Option<String>,

    /// Peer forwarding endpoint of another cluster node (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    run::run(run::RunArgs {
        topology: cli.topology,
        grace: cli.grace,
        peer_listen: cli.peer_listen,
        peers: cli.peers,
    })
    .await
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
