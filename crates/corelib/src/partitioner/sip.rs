//! SipHash partitioner implementation.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::partitioner::traits::Partitioner;
use crate::token::Token;

/// SipHash-1-3 partitioner with fixed all-zero keys.
///
/// The keys must stay fixed: every node of a cluster has to compute the same
/// token for the same key.
#[derive(Clone, Debug, Default)]
pub struct SipPartitioner;

impl Partitioner for SipPartitioner {
    fn partition(&self, key: &[u8]) -> Token {
        let mut hasher = SipHasher13::new();
        hasher.write(key);
        Token(hasher.finish())
    }

    fn name(&self) -> &'static str {
        "SipPartitioner"
    }
}
