//! Token abstraction module for consistent hashing.
//!
//! A token is a position on the ring. The token space is the full `u64`
//! range and wraps around: the successor of `u64::MAX` is `0`.

use std::fmt;

/// Position on the hash ring.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Token(pub u64);

impl Token {
    /// Minimum token value (start of ring).
    pub const MIN: Token = Token(0);
    /// Maximum token value (end of ring).
    pub const MAX: Token = Token(u64::MAX);

    /// Clockwise distance from `self` to `other` on the ring.
    ///
    /// # Performance
    /// - **Time**: O(1)
    #[inline]
    pub fn distance_to(&self, other: &Self) -> u64 {
        other.0.wrapping_sub(self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Token(value)
    }
}
