//! Node abstractions for the consistent hash ring.
//!
//! Nodes represent physical cache processes. They are identified by an opaque
//! string `NodeId`; the ring never interprets it beyond hashing.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Identifier for a node in the cluster.
///
/// Backed by `Arc<str>` so the many clones made while walking the ring and
/// fanning out requests are a refcount bump rather than an allocation.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Physical node participating in the ring.
///
/// Keep this struct small and cheap to clone; connections and the local store
/// live elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    /// Base URL peers use to reach this node (`http://host:port`).
    pub endpoint: String,
}

impl Node {
    /// Construct a new node.
    pub fn new(id: impl Into<NodeId>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl FromStr for Node {
    type Err = Error;

    /// Parses `id=endpoint`, e.g. `node1=http://127.0.0.1:3001`.
    fn from_str(spec: &str) -> Result<Self> {
        let (id, endpoint) = spec
            .split_once('=')
            .ok_or_else(|| Error::InvalidNode(format!("expected id=endpoint, got '{}'", spec)))?;

        let id = id.trim();
        let endpoint = endpoint.trim().trim_end_matches('/');
        if id.is_empty() {
            return Err(Error::InvalidNode(format!("empty node id in '{}'", spec)));
        }
        if endpoint.is_empty() {
            return Err(Error::InvalidNode(format!("empty endpoint for node '{}'", id)));
        }

        Ok(Node::new(id, endpoint))
    }
}
