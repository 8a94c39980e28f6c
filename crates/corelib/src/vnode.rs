//! Virtual node abstractions.
//!
//! # Virtual Nodes (VNodes) Concept
//!
//! Instead of each physical node having a single token on the ring, each node
//! has multiple tokens (virtual nodes). This provides:
//!
//! 1. **Better Load Distribution**: More tokens = smoother distribution of keys
//! 2. **Gradual Rebalancing**: When a node joins or leaves, roughly `1/n` of
//!    the keys move, whichever node it was
//!
//! # Performance Characteristics
//!
//! - **Memory**: O(v) where v = number of vnodes per node
//! - **Lookup**: O(log n) where n = total vnodes
//!
//! # Typical Configuration
//!
//! - **Tests**: 4-10 vnodes/node keeps rings small enough to reason about
//! - **Clusters**: 100 vnodes/node (the ring default)

use crate::node::NodeId;
use crate::partitioner::Partitioner;
use crate::token::Token;

/// A virtual node on the hash ring.
///
/// Represents a single token position owned by a physical node.
///
/// # Invariants
///
/// - Every `VirtualNode` belongs to exactly one physical node
/// - Ordering is by token first, then node id, so a sorted list of vnodes is
///   a total order even if two labels collide on the same token
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualNode {
    /// Token position on the ring, the hash of `"node_id:vnode_index"`.
    pub token: Token,

    /// The physical node that owns this virtual node.
    pub node_id: NodeId,
}

impl VirtualNode {
    /// Create a new virtual node.
    #[inline]
    pub fn new(token: Token, node_id: NodeId) -> Self {
        Self { token, node_id }
    }

    /// Create a virtual node from a node ID and vnode index.
    ///
    /// The token is the partitioner's hash of `"node_id:vnode_index"`.
    ///
    /// # Example
    /// ```rust
    /// use corelib::{NodeId, VirtualNode};
    /// use corelib::partitioner::SipPartitioner;
    ///
    /// let vnode0 = VirtualNode::from_index(&SipPartitioner, NodeId::from("node1"), 0);
    /// let vnode1 = VirtualNode::from_index(&SipPartitioner, NodeId::from("node1"), 1);
    /// assert_ne!(vnode0.token, vnode1.token);
    /// ```
    pub fn from_index(partitioner: &dyn Partitioner, node_id: NodeId, vnode_index: usize) -> Self {
        let label = format!("{}:{}", node_id, vnode_index);
        let token = partitioner.partition(label.as_bytes());
        Self::new(token, node_id)
    }

    #[inline]
    pub fn token(&self) -> Token {
        self.token
    }

    #[inline]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }
}

impl std::fmt::Display for VirtualNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VNode(token={}, node={})", self.token, self.node_id)
    }
}
