//! Immutable snapshot of the replicas a coordinator can reach.

use std::collections::BTreeMap;
use std::sync::Arc;

use corelib::NodeId;

use crate::replica::Replica;

/// Node id to replica mapping, including the local node.
///
/// Never mutated in place: a membership change builds a new snapshot, and
/// requests already running keep using the one they started with.
#[derive(Clone)]
pub struct Membership {
    local: NodeId,
    replicas: BTreeMap<NodeId, Arc<dyn Replica>>,
}

impl Membership {
    /// Membership containing only the local replica.
    pub fn new(local: Arc<dyn Replica>) -> Self {
        let id = local.node_id().clone();
        let mut replicas = BTreeMap::new();
        replicas.insert(id.clone(), local);
        Self {
            local: id,
            replicas,
        }
    }

    /// Copy of this snapshot with `replica` added (or replaced).
    pub fn with_replica(&self, replica: Arc<dyn Replica>) -> Self {
        let mut next = self.clone();
        next.replicas.insert(replica.node_id().clone(), replica);
        next
    }

    /// Copy of this snapshot without `id`. The local node cannot be removed.
    pub fn without(&self, id: &NodeId) -> Self {
        let mut next = self.clone();
        if id != &self.local {
            next.replicas.remove(id);
        }
        next
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local
    }

    pub fn is_local(&self, id: &NodeId) -> bool {
        id == &self.local
    }

    pub fn get(&self, id: &NodeId) -> Option<Arc<dyn Replica>> {
        self.replicas.get(id).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.replicas.contains_key(id)
    }

    /// Every replica except the local one, ordered by node id.
    pub fn peers(&self) -> impl Iterator<Item = &Arc<dyn Replica>> + '_ {
        self.replicas
            .iter()
            .filter(move |(id, _)| *id != &self.local)
            .map(|(_, replica)| replica)
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("local", &self.local)
            .field("nodes", &self.replicas.keys().collect::<Vec<_>>())
            .finish()
    }
}
