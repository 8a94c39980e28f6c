//! CLI commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Subcommand;
use corelib::node::NodeId;
use corelib::ring::HashRing;
use replication::{
    spawn_anti_entropy, Coordinator, LocalStore, Replica, ReplicationStrategy, SimpleStrategy,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use transport::{HttpReplica, NodeServer};

use crate::config::{CliConfig, ClusterConfig};

pub type CommandResult = anyhow::Result<()>;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a cache node until interrupted
    Serve,

    /// Show the replica set for a key
    Locate {
        /// Key to place
        key: String,
    },

    /// Show how much of the key space each node owns
    Ring,

    /// Print the effective configuration
    Config,
}

impl CliConfig {
    pub async fn run(&self) -> CommandResult {
        let config = self.cluster_config()?;
        match &self.command {
            Command::Serve => {
                config.validate()?;
                serve(config).await
            }
            Command::Locate { key } => {
                locate(&config, key);
                Ok(())
            }
            Command::Ring => {
                for (node, share) in ownership(&config.ring()) {
                    println!("{:<16} {:>6.2}%", node, share * 100.0);
                }
                Ok(())
            }
            Command::Config => {
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        }
    }
}

async fn serve(config: ClusterConfig) -> CommandResult {
    let local = config.local_id();
    let quorum = config.quorum();

    let mut peers: Vec<Arc<dyn Replica>> = Vec::new();
    for node in config.members().into_iter().filter(|n| n.id != local) {
        peers.push(Arc::new(HttpReplica::new(&node, quorum.peer_timeout)?));
    }

    let coordinator = Arc::new(Coordinator::new(
        local,
        Arc::new(LocalStore::new()),
        Arc::new(config.ring()),
        peers,
        quorum,
    ));

    let shutdown = CancellationToken::new();
    let anti_entropy = config
        .anti_entropy_interval()
        .map(|interval| spawn_anti_entropy(Arc::clone(&coordinator), interval, shutdown.clone()));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                signal.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    let server = NodeServer::bind(&config.bind).await?;
    server.serve(Arc::clone(&coordinator), shutdown.clone()).await?;

    shutdown.cancel();
    if let Some(handle) = anti_entropy {
        handle.await?;
    }
    coordinator.wait_background().await;
    Ok(())
}

fn locate(config: &ClusterConfig, key: &str) {
    let ring = config.ring();
    let strategy = SimpleStrategy::new(config.replication_factor);
    for (i, id) in strategy.replicas_for_key(&ring, key.as_bytes()).iter().enumerate() {
        let endpoint = ring.get_node(id).map(|n| n.endpoint).unwrap_or_default();
        let role = if i == 0 { "primary" } else { "replica" };
        println!("{:<8} {:<16} {}", role, id, endpoint);
    }
}

/// Fraction of the token space owned by each node.
///
/// A virtual node owns the arc from its predecessor's token (exclusive) to
/// its own (inclusive).
pub fn ownership(ring: &HashRing) -> Vec<(NodeId, f64)> {
    let tokens = ring.tokens();
    let mut shares: BTreeMap<NodeId, f64> = BTreeMap::new();

    if let [(_, only)] = tokens.as_slice() {
        shares.insert(only.clone(), 1.0);
    } else {
        let space = 2f64.powi(64);
        for (i, (token, owner)) in tokens.iter().enumerate() {
            let prev = if i == 0 { &tokens[tokens.len() - 1].0 } else { &tokens[i - 1].0 };
            *shares.entry(owner.clone()).or_default() += prev.distance_to(token) as f64 / space;
        }
    }

    shares.into_iter().collect()
}
