//! Error types for the core library.

use std::fmt;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid node specification (empty id, missing endpoint, ...)
    InvalidNode(String),
    /// Digest text that is not a hex-encoded hash
    InvalidDigest(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidNode(msg) => write!(f, "Invalid node: {}", msg),
            Error::InvalidDigest(msg) => write!(f, "Invalid digest: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
