//! Core library for the replicated cache.
//!
//! This crate provides the leaf data structures the rest of the workspace
//! builds on:
//! - Node identity and metadata
//! - Tokens and partitioners (key hashing)
//! - Virtual nodes and the consistent hash ring
//! - The Merkle digest used to compare replica contents

pub mod error;
pub mod merkle;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod token;
pub mod vnode;

pub use error::{Error, Result};
pub use merkle::{Digest, MerkleTree};
pub use node::{Node, NodeId};
pub use partitioner::Partitioner;
pub use ring::{HashRing, RingBuilder};
pub use token::Token;
pub use vnode::VirtualNode;
