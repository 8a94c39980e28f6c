//! Uniform access to a replica, wherever it lives.
//!
//! The coordinator only ever talks to `dyn Replica`. The node's own store is
//! wrapped in [`LocalReplica`]; peers are reached through a network
//! implementation (see the `transport` crate). Tests substitute fakes.

use std::sync::Arc;

use async_trait::async_trait;
use corelib::merkle::Digest;
use corelib::NodeId;

use crate::error::ReplicationResult;
use crate::store::{Entry, LocalStore};

/// Capability interface for one replica of the key space.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the coordinator calls a single
/// replica from many concurrent requests.
#[async_trait]
pub trait Replica: Send + Sync + 'static {
    /// Node this replica belongs to.
    fn node_id(&self) -> &NodeId;

    /// Read a key. `Ok(None)` means the replica answered and does not hold it.
    async fn read(&self, key: &str) -> ReplicationResult<Option<Entry>>;

    /// Store an already-decided value and timestamp.
    async fn write(&self, key: &str, entry: &Entry) -> ReplicationResult<()>;

    /// Remove a key.
    async fn delete(&self, key: &str) -> ReplicationResult<()>;

    /// Current Merkle root of the replica's contents.
    async fn digest(&self) -> ReplicationResult<Digest>;
}

/// The node's own store, seen as a replica. Never fails.
#[derive(Debug, Clone)]
pub struct LocalReplica {
    node_id: NodeId,
    store: Arc<LocalStore>,
}

impl LocalReplica {
    pub fn new(node_id: NodeId, store: Arc<LocalStore>) -> Self {
        Self { node_id, store }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }
}

#[async_trait]
impl Replica for LocalReplica {
    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    async fn read(&self, key: &str) -> ReplicationResult<Option<Entry>> {
        Ok(self.store.get(key))
    }

    async fn write(&self, key: &str, entry: &Entry) -> ReplicationResult<()> {
        self.store.put(key, entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> ReplicationResult<()> {
        self.store.delete(key);
        Ok(())
    }

    async fn digest(&self) -> ReplicationResult<Digest> {
        Ok(self.store.digest())
    }
}
