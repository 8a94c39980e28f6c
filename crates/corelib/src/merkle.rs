//! Merkle digest over an unordered set of records.
//!
//! Replicas compare their whole contents by exchanging a single root hash.
//! The root depends only on the *set* of records, never on the order they
//! were inserted in, because records are sorted before hashing.
//!
//! # Construction
//!
//! ```text
//!            root = H(h01 ++ h22)
//!           /                    \
//!     h01 = H(h0 ++ h1)     h22 = H(h2 ++ h2)   <- odd level: last pairs with itself
//!      /        \              |
//!  h0=H(r0)  h1=H(r1)      h2=H(r2)             <- leaves over sorted records
//! ```
//!
//! Hashes are BLAKE3, carried as lowercase hex; parents hash the
//! concatenation of their children's hex strings.
//!
//! - zero records: root = `H("")`
//! - one record: root = that record's leaf hash

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length of a hex-encoded BLAKE3 hash.
const DIGEST_HEX_LEN: usize = 64;

/// Root hash of a [`MerkleTree`], hex encoded.
///
/// Opaque to callers: two digests are only ever compared for equality.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Hash arbitrary bytes.
    pub fn of(data: impl AsRef<[u8]>) -> Self {
        Digest(blake3::hash(data.as_ref()).to_hex().to_string())
    }

    /// Digest of the empty record set.
    pub fn empty() -> Self {
        Self::of(b"")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        let valid = text.len() == DIGEST_HEX_LEN
            && text.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(Error::InvalidDigest(format!(
                "expected {} lowercase hex characters, got '{}'",
                DIGEST_HEX_LEN, text
            )));
        }
        Ok(Digest(text.to_string()))
    }
}

/// Merkle tree over a set of serialized records.
///
/// Only the root is retained; the tree is rebuilt when the record set
/// changes.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    leaf_count: usize,
    root: Digest,
}

impl MerkleTree {
    /// Build a tree from records in any order.
    ///
    /// # Performance
    /// - **Time**: O(k log k) for the sort plus O(k) hashes
    /// - **Space**: O(k) for one level of hex hashes
    pub fn new<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records: Vec<S> = records.into_iter().collect();
        records.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

        let leaves: Vec<Digest> = records.iter().map(|r| Digest::of(r.as_ref())).collect();
        let leaf_count = leaves.len();

        Self {
            leaf_count,
            root: reduce(leaves),
        }
    }

    pub fn root(&self) -> &Digest {
        &self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }
}

/// Pairwise-hash levels until one node remains.
fn reduce(mut level: Vec<Digest>) -> Digest {
    if level.is_empty() {
        return Digest::empty();
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut joined = String::with_capacity(DIGEST_HEX_LEN * 2);
                joined.push_str(left.as_str());
                joined.push_str(right.as_str());
                Digest::of(joined)
            })
            .collect();
    }

    // Loop leaves exactly one element.
    level.swap_remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree_hashes_empty_string() {
        let tree = MerkleTree::new(Vec::<String>::new());
        assert_eq!(tree.root(), &Digest::of(""));
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn test_single_record_is_its_leaf() {
        let tree = MerkleTree::new(["a:1:10"]);
        assert_eq!(tree.root(), &Digest::of("a:1:10"));
    }

    #[test]
    fn test_odd_level_pairs_last_with_itself() {
        let h = |s: &str| Digest::of(s);
        let join = |a: &Digest, b: &Digest| Digest::of(format!("{}{}", a, b));

        let (h0, h1, h2) = (h("a"), h("b"), h("c"));
        let expected = join(&join(&h0, &h1), &join(&h2, &h2));

        let tree = MerkleTree::new(["c", "a", "b"]);
        assert_eq!(tree.root(), &expected);
    }

    #[test]
    fn test_order_independent() {
        let a = MerkleTree::new(["x:1:1", "y:2:2", "z:3:3"]);
        let b = MerkleTree::new(["z:3:3", "x:1:1", "y:2:2"]);
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_sensitive_to_modification() {
        let a = MerkleTree::new(["x:1:1", "y:2:2"]);
        let b = MerkleTree::new(["x:1:1", "y:2:3"]);
        let c = MerkleTree::new(["x:1:1"]);
        assert_ne!(a.root(), b.root());
        assert_ne!(a.root(), c.root());
    }

    #[test]
    fn test_digest_parse_round_trip() {
        let digest = Digest::of("hello");
        let parsed: Digest = digest.to_string().parse().unwrap();
        assert_eq!(parsed, digest);
        assert!("different-root".parse::<Digest>().is_err());
    }
}
