//! Hash ring data structure.
//!
//! The ring keeps every virtual node in one vector sorted by token. Lookups
//! binary-search for the first token `>= hash(key)` and wrap to the smallest
//! token when the key hashes past the last one.
//!
//! # Concurrency
//!
//! Ring state is an immutable snapshot behind `RwLock<Arc<_>>`. Membership
//! changes build a fresh snapshot and swap it in; lookups clone the `Arc` and
//! run against that snapshot without holding the lock, so a lookup never sees
//! a half-added or half-removed node.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::node::{Node, NodeId};
use crate::partitioner::{Partitioner, SipPartitioner};
use crate::token::Token;
use crate::vnode::VirtualNode;

/// Virtual nodes per physical node when none is specified.
pub const DEFAULT_VNODES: usize = 100;

#[derive(Debug, Default, Clone)]
struct RingState {
    /// All virtual nodes, sorted by `(token, node_id)`.
    vnodes: Vec<VirtualNode>,
    /// Physical node metadata.
    nodes: BTreeMap<NodeId, Node>,
}

impl RingState {
    /// Index of the first vnode at or after `token`, wrapping to 0.
    ///
    /// Callers guarantee the ring is non-empty.
    fn successor(&self, token: Token) -> usize {
        let idx = self.vnodes.partition_point(|v| v.token < token);
        if idx == self.vnodes.len() {
            0
        } else {
            idx
        }
    }
}

/// Consistent hash ring mapping keys to physical nodes via virtual nodes.
///
/// # Example
///
/// ```rust
/// use corelib::node::Node;
/// use corelib::ring::HashRing;
///
/// let ring = HashRing::new();
/// ring.add_node(Node::new("node1", "http://127.0.0.1:3001"), 16);
/// ring.add_node(Node::new("node2", "http://127.0.0.1:3002"), 16);
///
/// let owners = ring.lookup_n(b"my-key", 2);
/// assert_eq!(owners.len(), 2);
/// ```
pub struct HashRing {
    partitioner: Arc<dyn Partitioner>,
    state: RwLock<Arc<RingState>>,
}

impl HashRing {
    /// Create an empty ring using the default partitioner.
    pub fn new() -> Self {
        Self::with_partitioner(SipPartitioner)
    }

    /// Create an empty ring using a custom partitioner.
    pub fn with_partitioner(partitioner: impl Partitioner) -> Self {
        Self::from_shared(Arc::new(partitioner))
    }

    fn from_shared(partitioner: Arc<dyn Partitioner>) -> Self {
        Self {
            partitioner,
            state: RwLock::new(Arc::new(RingState::default())),
        }
    }

    fn snapshot(&self) -> Arc<RingState> {
        Arc::clone(&self.state.read())
    }

    /// Add a physical node with `vnodes` virtual positions.
    ///
    /// Positions are `hash("id:i")` for `i` in `0..vnodes`. Adding a node that
    /// is already present inserts its positions a second time; callers are
    /// expected not to do that.
    ///
    /// # Performance
    /// - **Time**: O(V log V) where V = total vnodes after the insert
    pub fn add_node(&self, node: Node, vnodes: usize) {
        let new_vnodes: Vec<VirtualNode> = (0..vnodes)
            .map(|i| VirtualNode::from_index(self.partitioner.as_ref(), node.id.clone(), i))
            .collect();

        let mut guard = self.state.write();
        let mut next = RingState::clone(&guard);
        next.vnodes.extend(new_vnodes);
        next.vnodes.sort_unstable();
        next.nodes.insert(node.id.clone(), node);
        *guard = Arc::new(next);
    }

    /// Remove a physical node and exactly its virtual positions.
    ///
    /// # Returns
    /// `true` if the node was on the ring, `false` otherwise (no-op)
    pub fn remove_node(&self, id: &NodeId) -> bool {
        let mut guard = self.state.write();
        if !guard.nodes.contains_key(id) {
            return false;
        }

        let mut next = RingState::clone(&guard);
        next.nodes.remove(id);
        next.vnodes.retain(|v| &v.node_id != id);
        *guard = Arc::new(next);
        true
    }

    /// Find the node owning `key`: the owner of the first virtual position
    /// clockwise from `hash(key)`.
    ///
    /// # Returns
    /// `None` when the ring is empty
    ///
    /// # Performance
    /// - **Time**: O(log V)
    pub fn lookup(&self, key: &[u8]) -> Option<NodeId> {
        let state = self.snapshot();
        if state.vnodes.is_empty() {
            return None;
        }

        let token = self.partitioner.partition(key);
        let idx = state.successor(token);
        Some(state.vnodes[idx].node_id.clone())
    }

    /// Find up to `count` distinct physical nodes for `key`, walking the ring
    /// clockwise from the key's successor position. The primary owner comes
    /// first.
    ///
    /// Returns fewer than `count` nodes when the ring holds fewer distinct
    /// nodes, and an empty list when `count == 0` or the ring is empty.
    ///
    /// # Performance
    /// - **Time**: O(log V + V) worst case; typically O(log V + count * vnodes)
    pub fn lookup_n(&self, key: &[u8], count: usize) -> Vec<NodeId> {
        let state = self.snapshot();
        if count == 0 || state.vnodes.is_empty() {
            return Vec::new();
        }

        let wanted = count.min(state.nodes.len());
        let mut owners = Vec::with_capacity(wanted);
        let mut seen = HashSet::with_capacity(wanted);

        let start = state.successor(self.partitioner.partition(key));
        let len = state.vnodes.len();
        for step in 0..len {
            let node_id = &state.vnodes[(start + step) % len].node_id;
            if seen.insert(node_id) {
                owners.push(node_id.clone());
                if owners.len() == wanted {
                    break;
                }
            }
        }

        owners
    }

    /// Like [`lookup`](Self::lookup) but returns the node's metadata.
    pub fn lookup_node(&self, key: &[u8]) -> Option<Node> {
        let id = self.lookup(key)?;
        self.get_node(&id)
    }

    /// Get a node's metadata by id.
    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.snapshot().nodes.get(id).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.snapshot().nodes.contains_key(id)
    }

    /// All physical nodes, ordered by id.
    pub fn nodes(&self) -> Vec<Node> {
        self.snapshot().nodes.values().cloned().collect()
    }

    /// All `(token, owner)` pairs in ring order (for debugging).
    pub fn tokens(&self) -> Vec<(Token, NodeId)> {
        self.snapshot()
            .vnodes
            .iter()
            .map(|v| (v.token, v.node_id.clone()))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.snapshot().nodes.len()
    }

    pub fn token_count(&self) -> usize {
        self.snapshot().vnodes.len()
    }

    pub fn partitioner_name(&self) -> &'static str {
        self.partitioner.name()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.snapshot();
        f.debug_struct("HashRing")
            .field("partitioner", &self.partitioner.name())
            .field("nodes", &state.nodes.len())
            .field("tokens", &state.vnodes.len())
            .finish()
    }
}

/// Builder for a ring with a known initial membership.
///
/// # Example
///
/// ```rust
/// use corelib::node::Node;
/// use corelib::ring::RingBuilder;
///
/// let ring = RingBuilder::new()
///     .with_vnodes(8)
///     .add_node(Node::new("node1", "http://127.0.0.1:3001"))
///     .add_node(Node::new("node2", "http://127.0.0.1:3002"))
///     .build();
/// assert_eq!(ring.token_count(), 16);
/// ```
pub struct RingBuilder {
    vnodes: usize,
    partitioner: Arc<dyn Partitioner>,
    nodes: Vec<(Node, Option<usize>)>,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self {
            vnodes: DEFAULT_VNODES,
            partitioner: Arc::new(SipPartitioner),
            nodes: Vec::new(),
        }
    }

    /// Set the default number of vnodes per node.
    pub fn with_vnodes(mut self, vnodes: usize) -> Self {
        self.vnodes = vnodes;
        self
    }

    /// Use a custom partitioner instead of [`SipPartitioner`].
    pub fn with_partitioner(mut self, partitioner: impl Partitioner) -> Self {
        self.partitioner = Arc::new(partitioner);
        self
    }

    /// Add a node with the default vnode count.
    pub fn add_node(mut self, node: Node) -> Self {
        self.nodes.push((node, None));
        self
    }

    /// Add a node with its own vnode count.
    pub fn add_node_with_vnodes(mut self, node: Node, vnodes: usize) -> Self {
        self.nodes.push((node, Some(vnodes)));
        self
    }

    pub fn build(self) -> HashRing {
        let ring = HashRing::from_shared(self.partitioner);
        for (node, vnodes) in self.nodes {
            ring.add_node(node, vnodes.unwrap_or(self.vnodes));
        }
        ring
    }
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Places `"<n>"` and `"<id>:<n>"` labels at token `n`.
    struct NumericPartitioner;

    impl Partitioner for NumericPartitioner {
        fn partition(&self, key: &[u8]) -> Token {
            let text = std::str::from_utf8(key).unwrap();
            let number = text.rsplit(':').next().unwrap();
            Token(number.parse().unwrap())
        }

        fn name(&self) -> &'static str {
            "NumericPartitioner"
        }
    }

    /// Node "a" owns tokens 0..5, node "b" owns tokens 0..10.
    fn numeric_ring() -> HashRing {
        let ring = HashRing::with_partitioner(NumericPartitioner);
        ring.add_node(Node::new("a", "http://a"), 5);
        ring.add_node(Node::new("b", "http://b"), 10);
        ring
    }

    #[test]
    fn test_successor_is_first_token_at_or_after_key() {
        let ring = numeric_ring();
        assert_eq!(ring.lookup(b"7"), Some(NodeId::from("b")));
        // token 3 is shared; (token, node_id) order puts "a" first
        assert_eq!(ring.lookup(b"3"), Some(NodeId::from("a")));
        assert_eq!(ring.token_count(), 15);
    }

    #[test]
    fn test_wraps_to_smallest_token() {
        let ring = numeric_ring();
        assert_eq!(ring.lookup(b"42"), Some(NodeId::from("a")));
        assert_eq!(ring.lookup_n(b"42", 2), vec![NodeId::from("a"), NodeId::from("b")]);
    }

    #[test]
    fn test_lookup_n_walks_clockwise() {
        let ring = numeric_ring();
        // tokens 7, 8, 9 belong to "b" only; the walk wraps to (0, "a")
        assert_eq!(ring.lookup_n(b"7", 2), vec![NodeId::from("b"), NodeId::from("a")]);
    }

    #[test]
    fn test_builder_uses_custom_partitioner() {
        let ring = RingBuilder::new()
            .with_vnodes(3)
            .with_partitioner(NumericPartitioner)
            .add_node(Node::new("a", "http://a"))
            .build();
        assert_eq!(ring.partitioner_name(), "NumericPartitioner");
        assert_eq!(ring.lookup(b"2"), Some(NodeId::from("a")));
    }

    #[test]
    fn test_lookup_n_skips_repeated_owner() {
        let ring = HashRing::new();
        ring.add_node(Node::new("a", "http://a"), 50);
        ring.add_node(Node::new("b", "http://b"), 1);
        let owners = ring.lookup_n(b"key", 2);
        assert_eq!(owners.len(), 2);
        assert_ne!(owners[0], owners[1]);
    }
}
