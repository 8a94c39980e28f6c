//! Periodic digest comparison between replicas.
//!
//! Each round compares the local store's Merkle root with every peer's. A
//! mismatch is only detected and reported; reconciling the data is left to
//! read repair or to whoever listens on the divergence sink.

use std::sync::Arc;
use std::time::Duration;

use corelib::merkle::Digest;
use corelib::NodeId;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::coordinator::Coordinator;

/// A peer whose digest differs from the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub peer: NodeId,
    pub local: Digest,
    pub remote: Digest,
}

/// Outcome of one anti-entropy round.
#[derive(Debug, Clone, Default)]
pub struct AntiEntropyReport {
    pub in_sync: Vec<NodeId>,
    pub diverged: Vec<Divergence>,
    pub unreachable: Vec<NodeId>,
}

impl AntiEntropyReport {
    pub fn is_consistent(&self) -> bool {
        self.diverged.is_empty()
    }

    /// Number of peers contacted.
    pub fn peers(&self) -> usize {
        self.in_sync.len() + self.diverged.len() + self.unreachable.len()
    }
}

/// Run [`Coordinator::anti_entropy`] every `interval` until `shutdown` fires.
///
/// The first round starts one full interval after the call.
pub fn spawn_anti_entropy(
    coordinator: Arc<Coordinator>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(node = %coordinator.local_id(), ?interval, "anti-entropy started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = coordinator.anti_entropy().await;
                    debug!(
                        in_sync = report.in_sync.len(),
                        diverged = report.diverged.len(),
                        unreachable = report.unreachable.len(),
                        "anti-entropy round complete"
                    );
                }
            }
        }
        info!(node = %coordinator.local_id(), "anti-entropy stopped");
    })
}
