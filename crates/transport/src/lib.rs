//! HTTP transport for the replicated cache.
//!
//! This crate provides both sides of the wire:
//! - `client`: [`HttpReplica`], a [`replication::Replica`] reached over HTTP
//! - `server`: the node's router, serving clients (`/{key}`) and peers
//!   (`/internal/...`)

pub mod client;
pub mod error;
pub mod server;

pub use client::HttpReplica;
pub use error::{TransportError, TransportResult};
pub use server::{router, AppState, NodeServer};
