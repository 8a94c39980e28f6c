//! Replication strategy abstractions.
//!
//! Replication strategies determine how many replicas a key gets and which
//! nodes hold them.
//!
//! - **SimpleStrategy**: N distinct nodes taken clockwise around the ring

pub mod simple;

pub use simple::SimpleStrategy;

use corelib::node::NodeId;
use corelib::ring::HashRing;

/// Trait for replication strategies.
///
/// Replica sets are computed from the ring on every call, never stored, so
/// they always reflect the current membership.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync) as they are shared
/// by every request a coordinator serves.
pub trait ReplicationStrategy: Send + Sync + 'static {
    /// Get the number of replicas this strategy creates.
    fn replication_factor(&self) -> usize;

    /// Find replica nodes for a given key.
    ///
    /// # Returns
    /// Distinct NodeIds that should hold replicas (primary first). Fewer than
    /// `replication_factor()` when the ring is smaller than that.
    fn replicas_for_key(&self, ring: &HashRing, key: &[u8]) -> Vec<NodeId>;

    /// Get the strategy name (for logging/debugging).
    fn name(&self) -> &'static str;
}
