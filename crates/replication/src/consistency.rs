//! Quorum configuration.

use std::time::Duration;

use crate::error::{ReplicationError, ReplicationResult};

/// Default deadline for a single replica call.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(2);

/// Replication factor and quorum sizes for one coordinator.
///
/// The expected invariant is `1 <= W, R <= N`. The coordinator does not check
/// it; whoever builds the configuration should call [`validate`](Self::validate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumConfig {
    /// Replication factor (N).
    pub replication_factor: usize,
    /// Write quorum (W).
    pub write_quorum: usize,
    /// Read quorum (R).
    pub read_quorum: usize,
    /// Deadline for each replica call; an expired call counts as no response.
    pub peer_timeout: Duration,
    /// Push the winning value to stale replicas after a read.
    pub read_repair: bool,
}

impl QuorumConfig {
    pub fn new(replication_factor: usize, write_quorum: usize, read_quorum: usize) -> Self {
        Self {
            replication_factor,
            write_quorum,
            read_quorum,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            read_repair: true,
        }
    }

    pub fn with_peer_timeout(mut self, timeout: Duration) -> Self {
        self.peer_timeout = timeout;
        self
    }

    pub fn with_read_repair(mut self, enabled: bool) -> Self {
        self.read_repair = enabled;
        self
    }

    /// Check `1 <= W, R <= N`.
    pub fn validate(&self) -> ReplicationResult<()> {
        let n = self.replication_factor;
        if n == 0 {
            return Err(ReplicationError::InvalidConfig(
                "replication factor must be at least 1".into(),
            ));
        }
        for (name, quorum) in [("write", self.write_quorum), ("read", self.read_quorum)] {
            if quorum == 0 || quorum > n {
                return Err(ReplicationError::InvalidConfig(format!(
                    "{} quorum {} must be between 1 and N={}",
                    name, quorum, n
                )));
            }
        }
        if self.peer_timeout.is_zero() {
            return Err(ReplicationError::InvalidConfig("peer timeout must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self::new(3, 2, 2)
    }
}
