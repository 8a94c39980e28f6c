//! Replication for the partitioned cache.
//!
//! This crate turns the ring from `corelib` into a replicated store:
//! - Where a key's replicas live (`strategy`)
//! - How many of them must answer (`consistency`)
//! - The authoritative per-node state (`store`)
//! - Uniform access to local and remote replicas (`replica`)
//! - The coordinator running quorum reads/writes, read repair and
//!   anti-entropy (`coordinator`, `anti_entropy`)

pub mod anti_entropy;
pub mod clock;
pub mod consistency;
pub mod coordinator;
pub mod error;
pub mod membership;
pub mod replica;
pub mod store;
pub mod strategy;

pub use anti_entropy::{spawn_anti_entropy, AntiEntropyReport, Divergence};
pub use clock::{Clock, SystemClock};
pub use consistency::QuorumConfig;
pub use coordinator::Coordinator;
pub use error::{ReplicationError, ReplicationResult};
pub use membership::Membership;
pub use replica::{LocalReplica, Replica};
pub use store::{Entry, LocalStore};
pub use strategy::{ReplicationStrategy, SimpleStrategy};
