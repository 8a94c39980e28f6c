//! Simple replication strategy.
//!
//! Places N replicas sequentially around the ring (clockwise from the primary).
//!
//! # Algorithm
//!
//! 1. Find the key's successor position on the ring
//! 2. Walk clockwise, collecting each physical node the first time it is seen
//! 3. Stop at N nodes or when every node has been collected
//!
//! # Performance
//!
//! - **Time**: O(log n + walked positions), n = tokens
//! - **Space**: O(r) - returns Vec of node IDs
//!
//! # Limitations
//!
//! - Doesn't consider data center/rack placement

use corelib::node::NodeId;
use corelib::ring::HashRing;

use crate::strategy::ReplicationStrategy;

/// Simple replication strategy: N replicas placed sequentially around the ring.
///
/// # Example
///
/// ```rust
/// use corelib::node::Node;
/// use corelib::ring::HashRing;
/// use replication::{ReplicationStrategy, SimpleStrategy};
///
/// let ring = HashRing::new();
/// ring.add_node(Node::new("node1", "http://127.0.0.1:3001"), 16);
/// ring.add_node(Node::new("node2", "http://127.0.0.1:3002"), 16);
///
/// let strategy = SimpleStrategy::new(3);
/// // Only two nodes exist, so only two replicas come back.
/// assert_eq!(strategy.replicas_for_key(&ring, b"my-key").len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SimpleStrategy {
    /// Number of replicas to create (including primary).
    replication_factor: usize,
}

impl SimpleStrategy {
    /// Create a new simple strategy with the given replication factor.
    ///
    /// # Arguments
    /// * `replication_factor` - Number of replicas
    ///   - 1: No replication (single copy)
    ///   - 3: Standard (primary + 2 replicas)
    pub fn new(replication_factor: usize) -> Self {
        Self {
            replication_factor,
        }
    }
}

impl Default for SimpleStrategy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ReplicationStrategy for SimpleStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn replicas_for_key(&self, ring: &HashRing, key: &[u8]) -> Vec<NodeId> {
        ring.lookup_n(key, self.replication_factor)
    }

    fn name(&self) -> &'static str {
        "SimpleStrategy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::node::Node;

    fn ring() -> HashRing {
        let ring = HashRing::new();
        for id in ["node1", "node2", "node3"] {
            ring.add_node(Node::new(id, format!("http://{}", id)), 4);
        }
        ring
    }

    #[test]
    fn test_simple_strategy_replication_factor() {
        let strategy = SimpleStrategy::new(3);
        assert_eq!(strategy.replication_factor(), 3);
    }

    #[test]
    fn test_simple_strategy_replicas() {
        let strategy = SimpleStrategy::new(3);
        let replicas = strategy.replicas_for_key(&ring(), b"test-key");

        assert_eq!(replicas.len(), 3);
        let unique: std::collections::HashSet<_> = replicas.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_primary_matches_ring_lookup() {
        let ring = ring();
        let strategy = SimpleStrategy::new(2);
        let replicas = strategy.replicas_for_key(&ring, b"test-key");
        assert_eq!(Some(replicas[0].clone()), ring.lookup(b"test-key"));
    }

    #[test]
    fn test_zero_factor() {
        assert!(SimpleStrategy::new(0).replicas_for_key(&ring(), b"k").is_empty());
    }
}
