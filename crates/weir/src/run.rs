//! Topology execution
//!
//! Load, validate, build, run, and gracefully stop a topology.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use weir_peer::{LocalPeerForwarder, PeerForwarder, PeerId, RemotePeerForwarder, RemotePeerForwarderConfig};
use weir_pipeline::PipelineBuilder;
use weir_plugin::{default_registry, PluginFactory};
use weir_topology::Topology;

/// Arguments for a topology run
pub struct RunArgs {
    pub topology: PathBuf,
    pub grace: Duration,
    pub peer_listen: Option<String>,
    pub peers: Vec<String>,
}

/// Run a topology until Ctrl-C, then drain and stop.
///
/// Errors out (non-zero exit) when the topology is invalid or when no
/// pipeline could be built.
pub async fn run(args: RunArgs) -> Result<()> {
    let topology = Topology::from_file(&args.topology)
        .with_context(|| format!("loading topology '{}'", args.topology.display()))?;

    let shutdown = CancellationToken::new();
    let forwarder = peer_forwarder(&args, &shutdown).await?;

    let factory = PluginFactory::new(Arc::new(default_registry()));
    let runnable = PipelineBuilder::new(factory, forwarder)
        .build(&topology)
        .context("invalid topology")?;

    if runnable.is_empty() {
        anyhow::bail!("no pipeline could be built from the topology");
    }

    // Downstream pipelines start first so their connectors are open
    // before any upstream produces a record
    for pipeline in runnable.values().rev() {
        pipeline.start();
    }
    tracing::info!(pipelines = runnable.len(), "topology running, Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received");

    // Upstreams stop first so everything they already emitted can drain
    // through the downstream pipelines
    for (name, pipeline) in runnable.iter() {
        let state = pipeline.stop(args.grace).await;
        let snapshot = pipeline.metrics();
        tracing::info!(
            pipeline = %name,
            state = %state,
            records_processed = snapshot.records_processed,
            records_dropped = snapshot.records_dropped,
            "pipeline shut down"
        );
    }

    shutdown.cancel();
    Ok(())
}

async fn peer_forwarder(
    args: &RunArgs,
    shutdown: &CancellationToken,
) -> Result<Arc<dyn PeerForwarder>> {
    match &args.peer_listen {
        Some(listen) => {
            let peers = args.peers.iter().map(|p| PeerId::new(p.clone())).collect();
            let config = RemotePeerForwarderConfig::new(listen.clone(), peers);
            let forwarder = RemotePeerForwarder::bind(config, shutdown.clone())
                .await
                .with_context(|| format!("binding peer forwarder on '{}'", listen))?;
            Ok(forwarder as Arc<dyn PeerForwarder>)
        }
        None => {
            if !args.peers.is_empty() {
                anyhow::bail!("--peer requires --peer-listen");
            }
            Ok(Arc::new(LocalPeerForwarder::default()))
        }
    }
}
