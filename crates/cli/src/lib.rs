//! Command-line entry point for cache nodes.
//!
//! Provides commands for:
//! - Running a node (`serve`)
//! - Inspecting placement (`locate`, `ring`)
//! - Checking the effective configuration (`config`)

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::{CliConfig, ClusterConfig};
