//! mesh-node: HTTP/1.1 server that keeps a grow-only set of request ids in
//! sync with its peers.

use std::path::PathBuf;

use clap::Parser;

use mesh_node::config::{self, NodeConfig};
use mesh_node::lifecycle::signals::wait_for_termination;
use mesh_node::node::PeerNode;
use mesh_node::observability;

#[derive(Parser)]
#[command(name = "mesh-node", version, about = "Peer-synchronized HTTP/1.1 node")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "MESH_NODE_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Extra seed peer (`host:port`); repeatable.
    #[arg(short, long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config: NodeConfig = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::loader::from_env()?,
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    config.node.seed_peers.extend(args.peers);
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    observability::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mesh-node starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        keep_alive_timeout_ms = config.connection.keep_alive_timeout_ms,
        max_requests_per_connection = config.connection.max_requests_per_connection,
        sync_interval_secs = config.sync.interval_secs,
        sync_last_n = config.sync.last_n,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let node = PeerNode::from_config(config)?;
    node.start().await?;

    wait_for_termination().await;
    tracing::info!("Shutdown signal received");
    node.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
