//! Replication error types

use std::time::Duration;

use corelib::NodeId;
use thiserror::Error;

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Replication-related errors
///
/// Only the two quorum failures ever reach a client. Peer failures are
/// swallowed at the dispatch boundary and counted as non-responses.
#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("Read quorum not reached: needed {needed}, got {got}")]
    ReadQuorumFailed { needed: usize, got: usize },

    #[error("Write quorum not reached: needed {needed}, got {got}")]
    WriteQuorumFailed { needed: usize, got: usize },

    #[error("Peer {node} unreachable: {reason}")]
    PeerUnreachable { node: NodeId, reason: String },

    #[error("Malformed response from {node}: {reason}")]
    MalformedResponse { node: NodeId, reason: String },

    #[error("Peer {node} did not answer within {timeout:?}")]
    Timeout { node: NodeId, timeout: Duration },

    #[error("Node not in membership: {0}")]
    UnknownNode(NodeId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReplicationError {
    /// True for the errors a client is allowed to see.
    pub fn is_quorum_failure(&self) -> bool {
        matches!(
            self,
            ReplicationError::ReadQuorumFailed { .. } | ReplicationError::WriteQuorumFailed { .. }
        )
    }
}
