//! Configuration for a cache node.
//!
//! Values come from an optional TOML file, overridden by command-line flags
//! and `QCACHE_*` environment variables.
//!
//! Example config:
//! ```toml
//! node_id = "node1"
//! bind = "127.0.0.1:3001"
//! replication_factor = 3
//! write_quorum = 2
//! read_quorum = 2
//!
//! [[nodes]]
//! id = "node1"
//! endpoint = "http://127.0.0.1:3001"
//!
//! [[nodes]]
//! id = "node2"
//! endpoint = "http://127.0.0.1:3002"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use corelib::node::{Node, NodeId};
use corelib::ring::{HashRing, RingBuilder, DEFAULT_VNODES};
use replication::QuorumConfig;
use serde::{Deserialize, Serialize};

use crate::commands::Command;

/// One cluster member as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    pub endpoint: String,
}

impl From<&NodeEntry> for Node {
    fn from(entry: &NodeEntry) -> Self {
        Node::new(entry.id.as_str(), entry.endpoint.trim_end_matches('/'))
    }
}

impl From<Node> for NodeEntry {
    fn from(node: Node) -> Self {
        Self {
            id: node.id.to_string(),
            endpoint: node.endpoint,
        }
    }
}

/// Cluster and node settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// This node's id; must appear in `nodes`.
    pub node_id: String,
    /// Listen address for the node's HTTP server.
    pub bind: String,
    /// Virtual nodes per physical node.
    pub vnodes: usize,
    pub replication_factor: usize,
    pub write_quorum: usize,
    pub read_quorum: usize,
    /// Deadline for each replica call, in milliseconds.
    pub peer_timeout_ms: u64,
    /// Seconds between anti-entropy rounds; 0 disables them.
    pub anti_entropy_interval_secs: u64,
    pub read_repair: bool,
    /// Full static membership, including this node.
    pub nodes: Vec<NodeEntry>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            bind: "127.0.0.1:3000".to_string(),
            vnodes: DEFAULT_VNODES,
            replication_factor: 3,
            write_quorum: 2,
            read_quorum: 2,
            peer_timeout_ms: 2_000,
            anti_entropy_interval_secs: 30,
            read_repair: true,
            nodes: Vec::new(),
        }
    }
}

impl ClusterConfig {
    /// Load a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Check the settings a node cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            bail!("node_id must be set");
        }
        if self.nodes.is_empty() {
            bail!("nodes must list the cluster membership");
        }
        if !self.nodes.iter().any(|n| n.id == self.node_id) {
            bail!("node_id '{}' is not listed in nodes", self.node_id);
        }
        if self.vnodes == 0 {
            bail!("vnodes must be at least 1");
        }

        let mut ids: Vec<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(dup) = ids.windows(2).find(|w| w[0] == w[1]) {
            bail!("node '{}' is listed twice", dup[0]);
        }

        self.quorum().validate()?;
        Ok(())
    }

    pub fn local_id(&self) -> NodeId {
        NodeId::from(self.node_id.as_str())
    }

    pub fn members(&self) -> Vec<Node> {
        self.nodes.iter().map(Node::from).collect()
    }

    pub fn quorum(&self) -> QuorumConfig {
        QuorumConfig::new(self.replication_factor, self.write_quorum, self.read_quorum)
            .with_peer_timeout(Duration::from_millis(self.peer_timeout_ms))
            .with_read_repair(self.read_repair)
    }

    pub fn anti_entropy_interval(&self) -> Option<Duration> {
        (self.anti_entropy_interval_secs > 0)
            .then(|| Duration::from_secs(self.anti_entropy_interval_secs))
    }

    /// Ring over the full membership. Every node builds the same one.
    pub fn ring(&self) -> HashRing {
        self.members()
            .into_iter()
            .fold(RingBuilder::new().with_vnodes(self.vnodes), |builder, node| {
                builder.add_node(node)
            })
            .build()
    }
}

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(name = "qcache")]
#[command(version)]
#[command(about = "Partitioned, replicated key-value cache", long_about = None)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// This node's id
    #[arg(long, env = "QCACHE_NODE_ID", global = true)]
    pub node_id: Option<String>,

    /// Listen address
    #[arg(long, env = "QCACHE_BIND", global = true)]
    pub bind: Option<String>,

    /// Cluster membership as id=url pairs (node1=http://127.0.0.1:3001,...)
    #[arg(long, env = "QCACHE_NODES", value_delimiter = ',', global = true)]
    pub nodes: Vec<Node>,

    /// Replication factor (N)
    #[arg(short = 'n', long, env = "QCACHE_N", global = true)]
    pub replication_factor: Option<usize>,

    /// Write quorum (W)
    #[arg(short = 'w', long, env = "QCACHE_W", global = true)]
    pub write_quorum: Option<usize>,

    /// Read quorum (R)
    #[arg(short = 'r', long, env = "QCACHE_R", global = true)]
    pub read_quorum: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "QCACHE_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

impl CliConfig {
    /// Config file (if any) with flags and environment applied on top.
    pub fn cluster_config(&self) -> Result<ClusterConfig> {
        let mut config = match &self.config {
            Some(path) => ClusterConfig::from_file(path)?,
            None => ClusterConfig::default(),
        };

        if let Some(node_id) = &self.node_id {
            config.node_id = node_id.clone();
        }
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if !self.nodes.is_empty() {
            config.nodes = self.nodes.iter().cloned().map(NodeEntry::from).collect();
        }
        if let Some(n) = self.replication_factor {
            config.replication_factor = n;
        }
        if let Some(w) = self.write_quorum {
            config.write_quorum = w;
        }
        if let Some(r) = self.read_quorum {
            config.read_quorum = r;
        }

        Ok(config)
    }
}
