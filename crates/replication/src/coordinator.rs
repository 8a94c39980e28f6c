//! Quorum coordinator.
//!
//! The coordinator:
//! 1. Maps a key to its N replicas (via the replication strategy)
//! 2. Sends one call per replica concurrently, each under a deadline
//! 3. Waits for every call to settle, counting failures as non-responses
//! 4. Applies the quorum rule (W for writes, R for reads)
//! 5. Resolves reads by last-write-wins and repairs stale replicas in the
//!    background
//!
//! Deletes are best-effort: they go to every replica but no quorum is
//! checked. Anti-entropy compares digests with every peer and reports
//! divergence without transferring data.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use corelib::node::{Node, NodeId};
use corelib::ring::HashRing;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::anti_entropy::{AntiEntropyReport, Divergence};
use crate::clock::{Clock, SystemClock};
use crate::consistency::QuorumConfig;
use crate::error::{ReplicationError, ReplicationResult};
use crate::membership::Membership;
use crate::replica::{LocalReplica, Replica};
use crate::store::{latest, Entry, LocalStore};
use crate::strategy::{ReplicationStrategy, SimpleStrategy};

/// A replica set member and the handle used to reach it, if known.
type Target = (NodeId, Option<Arc<dyn Replica>>);

/// Coordinates client operations across a key's replica set.
///
/// Each operation is stateless; all state lives in the stores and the ring.
pub struct Coordinator {
    local: NodeId,
    store: Arc<LocalStore>,
    ring: Arc<HashRing>,
    strategy: Arc<dyn ReplicationStrategy>,
    membership: RwLock<Arc<Membership>>,
    config: QuorumConfig,
    clock: Arc<dyn Clock>,
    divergence_sink: Option<mpsc::Sender<Divergence>>,
    background: TaskTracker,
    drain: tokio::sync::Mutex<()>,
}

impl Coordinator {
    /// Create a coordinator for the node `local`.
    ///
    /// `store` becomes the local replica; `peers` are the remote ones. The
    /// ring is shared and is expected to already contain the membership.
    pub fn new(
        local: NodeId,
        store: Arc<LocalStore>,
        ring: Arc<HashRing>,
        peers: impl IntoIterator<Item = Arc<dyn Replica>>,
        config: QuorumConfig,
    ) -> Self {
        let local_replica: Arc<dyn Replica> =
            Arc::new(LocalReplica::new(local.clone(), Arc::clone(&store)));
        let membership = peers
            .into_iter()
            .filter(|peer| peer.node_id() != &local)
            .fold(Membership::new(local_replica), |m, peer| m.with_replica(peer));

        Self {
            strategy: Arc::new(SimpleStrategy::new(config.replication_factor)),
            local,
            store,
            ring,
            membership: RwLock::new(Arc::new(membership)),
            config,
            clock: Arc::new(SystemClock),
            divergence_sink: None,
            background: TaskTracker::new(),
            drain: tokio::sync::Mutex::new(()),
        }
    }

    /// Use a different timestamp source.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use a different replica placement strategy.
    pub fn with_strategy(mut self, strategy: impl ReplicationStrategy) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    /// Forward anti-entropy divergences to `sink` (e.g. a reconciler).
    pub fn with_divergence_sink(mut self, sink: mpsc::Sender<Divergence>) -> Self {
        self.divergence_sink = Some(sink);
        self
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// Current membership snapshot.
    pub fn membership(&self) -> Arc<Membership> {
        Arc::clone(&self.membership.read())
    }

    /// Replica set for `key` under the current ring, primary first.
    pub fn replicas_for(&self, key: &str) -> Vec<NodeId> {
        self.strategy.replicas_for_key(&self.ring, key.as_bytes())
    }

    fn targets(&self, key: &str) -> Vec<Target> {
        let membership = self.membership();
        self.replicas_for(key)
            .into_iter()
            .map(|id| {
                let replica = membership.get(&id);
                (id, replica)
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // GET
    // -----------------------------------------------------------------------

    /// Quorum read.
    ///
    /// # Returns
    /// - `Ok(Some(entry))`: the last-write-wins winner among the responses
    /// - `Ok(None)`: at least R replicas answered and none holds the key
    /// - `Err(ReadQuorumFailed)`: fewer than R replicas answered
    pub async fn get(&self, key: &str) -> ReplicationResult<Option<Entry>> {
        let targets = self.targets(key);
        let timeout = self.config.peer_timeout;

        let reads = targets.iter().map(|(node, replica)| async move {
            let answer = match replica {
                Some(replica) => settle(node, "read", timeout, replica.read(key)).await,
                None => failed(node, "read", ReplicationError::UnknownNode(node.clone())),
            };
            answer.map(|entry| (node.clone(), entry))
        });
        let answered: Vec<(NodeId, Option<Entry>)> =
            join_all(reads).await.into_iter().flatten().collect();

        let needed = self.config.read_quorum;
        if answered.len() < needed {
            metrics::counter!("qcache_read_quorum_failures_total").increment(1);
            warn!(key, needed, got = answered.len(), "read quorum not reached");
            return Err(ReplicationError::ReadQuorumFailed {
                needed,
                got: answered.len(),
            });
        }

        let winner = latest(answered.iter().filter_map(|(_, entry)| entry.as_ref())).cloned();
        if let Some(winner) = &winner {
            if self.config.read_repair {
                self.spawn_read_repair(key, winner, &answered, &targets);
            }
        }

        debug!(key, responses = answered.len(), found = winner.is_some(), "read complete");
        Ok(winner)
    }

    /// Push `winner` to every answering replica that is missing it or holds
    /// an entry it supersedes. Runs detached; failures are logged only.
    fn spawn_read_repair(
        &self,
        key: &str,
        winner: &Entry,
        answered: &[(NodeId, Option<Entry>)],
        targets: &[Target],
    ) {
        let stale: Vec<Arc<dyn Replica>> = answered
            .iter()
            .filter(|(_, entry)| entry.as_ref().map_or(true, |e| winner.supersedes(e)))
            .filter_map(|(node, _)| {
                targets
                    .iter()
                    .find(|(id, _)| id == node)
                    .and_then(|(_, replica)| replica.clone())
            })
            .collect();

        if stale.is_empty() {
            return;
        }

        metrics::counter!("qcache_read_repairs_total").increment(stale.len() as u64);
        let key = key.to_string();
        let winner = winner.clone();
        let timeout = self.config.peer_timeout;

        self.background.spawn(async move {
            let repairs = stale.iter().map(|replica| {
                let (key, winner) = (&key, &winner);
                async move {
                    let node = replica.node_id();
                    if settle(node, "repair", timeout, replica.write(key, winner))
                        .await
                        .is_some()
                    {
                        debug!(node = %node, key = %key, timestamp = winner.timestamp, "read repair applied");
                    }
                }
            });
            join_all(repairs).await;
        });
    }

    // -----------------------------------------------------------------------
    // SET
    // -----------------------------------------------------------------------

    /// Quorum write.
    ///
    /// One timestamp is taken for the whole write and sent to every replica.
    /// Replicas that accepted the write keep it even when the quorum fails.
    ///
    /// # Returns
    /// The entry as written, or `WriteQuorumFailed` when fewer than W
    /// replicas acknowledged.
    pub async fn set(&self, key: &str, value: impl Into<String>) -> ReplicationResult<Entry> {
        let entry = Entry::new(value, self.clock.now_millis());
        let targets = self.targets(key);
        let timeout = self.config.peer_timeout;

        let entry_ref = &entry;
        let writes = targets.iter().map(|(node, replica)| async move {
            match replica {
                Some(replica) => settle(node, "write", timeout, replica.write(key, entry_ref)).await,
                None => failed(node, "write", ReplicationError::UnknownNode(node.clone())),
            }
        });
        let acks = join_all(writes).await.into_iter().flatten().count();

        let needed = self.config.write_quorum;
        if acks < needed {
            metrics::counter!("qcache_write_quorum_failures_total").increment(1);
            warn!(key, needed, got = acks, "write quorum not reached");
            return Err(ReplicationError::WriteQuorumFailed { needed, got: acks });
        }

        debug!(key, acks, timestamp = entry.timestamp, "write complete");
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // DELETE
    // -----------------------------------------------------------------------

    /// Best-effort delete on every replica. No quorum is enforced.
    ///
    /// # Returns
    /// Number of replicas that acknowledged, for diagnostics only
    pub async fn delete(&self, key: &str) -> usize {
        let targets = self.targets(key);
        let timeout = self.config.peer_timeout;

        let deletes = targets.iter().map(|(node, replica)| async move {
            match replica {
                Some(replica) => settle(node, "delete", timeout, replica.delete(key)).await,
                None => failed(node, "delete", ReplicationError::UnknownNode(node.clone())),
            }
        });
        let acks = join_all(deletes).await.into_iter().flatten().count();

        debug!(key, acks, replicas = targets.len(), "delete complete");
        acks
    }

    // -----------------------------------------------------------------------
    // Anti-entropy
    // -----------------------------------------------------------------------

    /// Compare the local digest with every peer's.
    ///
    /// Divergence is reported, never repaired here. An unreachable peer is
    /// logged and skipped.
    pub async fn anti_entropy(&self) -> AntiEntropyReport {
        let local_digest = self.store.digest();
        let membership = self.membership();
        let timeout = self.config.peer_timeout;
        let mut report = AntiEntropyReport::default();

        for peer in membership.peers() {
            let node = peer.node_id().clone();
            match settle(&node, "digest", timeout, peer.digest()).await {
                None => report.unreachable.push(node),
                Some(remote) if remote == local_digest => report.in_sync.push(node),
                Some(remote) => {
                    metrics::counter!("qcache_digest_mismatches_total").increment(1);
                    warn!(local = %self.local, peer = %node, "digest mismatch with peer");

                    let divergence = Divergence {
                        peer: node,
                        local: local_digest.clone(),
                        remote,
                    };
                    if let Some(sink) = &self.divergence_sink {
                        if let Err(e) = sink.try_send(divergence.clone()) {
                            debug!(error = %e, "divergence sink unavailable");
                        }
                    }
                    report.diverged.push(divergence);
                }
            }
        }

        report
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add a node to the ring and make its replica reachable.
    ///
    /// The replica is published before the ring changes so a lookup never
    /// returns a node the coordinator cannot reach.
    pub fn join(&self, node: Node, vnodes: usize, replica: Arc<dyn Replica>) {
        let id = node.id.clone();
        {
            let mut guard = self.membership.write();
            *guard = Arc::new(guard.with_replica(replica));
        }
        self.ring.add_node(node, vnodes);
        info!(node = %id, "node joined");
    }

    /// Remove a node from the ring and from the membership.
    ///
    /// # Returns
    /// `true` if the node was on the ring
    pub fn leave(&self, id: &NodeId) -> bool {
        let removed = self.ring.remove_node(id);
        {
            let mut guard = self.membership.write();
            *guard = Arc::new(guard.without(id));
        }
        if removed {
            info!(node = %id, "node left");
        }
        removed
    }

    /// Wait for every background read repair spawned so far.
    ///
    /// Safe to call from several tasks at once: callers are serialized, so
    /// one caller's `reopen` cannot cut short another caller's wait. Repairs
    /// spawned while a wait is in progress are tracked as usual.
    pub async fn wait_background(&self) {
        let _drain = self.drain.lock().await;
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("local", &self.local)
            .field("config", &self.config)
            .field("strategy", &self.strategy.name())
            .finish_non_exhaustive()
    }
}

/// Run one replica call under a deadline, turning any failure into `None`.
async fn settle<T>(
    node: &NodeId,
    op: &'static str,
    timeout: Duration,
    call: impl Future<Output = ReplicationResult<T>>,
) -> Option<T> {
    let error = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => e,
        Err(_) => ReplicationError::Timeout {
            node: node.clone(),
            timeout,
        },
    };

    failed(node, op, error)
}

/// Count and log a replica that will not answer this call.
fn failed<T>(node: &NodeId, op: &'static str, error: ReplicationError) -> Option<T> {
    metrics::counter!("qcache_peer_failures_total", "op" => op).increment(1);
    warn!(node = %node, op, error = %error, "replica call failed");
    None
}
