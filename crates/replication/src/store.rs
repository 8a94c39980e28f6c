//! Authoritative per-node key/value state.
//!
//! `LocalStore` is a blind store: `set` always overwrites and `delete`
//! always removes. Ordering between replicas is decided by the coordinator
//! (last-write-wins on `Entry::timestamp`) before a value ever reaches a
//! store.
//!
//! The whole store sits behind one mutex. Client writes, replica writes
//! from peers, read repair and digest computation all serialize on it, so a
//! digest always describes one consistent snapshot of the entries.

use std::cmp::Ordering;
use std::collections::HashMap;

use corelib::merkle::{Digest, MerkleTree};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One key's current state on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub value: String,
    /// Milliseconds since the Unix epoch, assigned by the coordinating node.
    pub timestamp: u64,
}

impl Entry {
    pub fn new(value: impl Into<String>, timestamp: u64) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }

    /// Last-write-wins order: timestamp first, then value so that replicas
    /// holding equal timestamps still agree on one winner.
    pub fn lww_cmp(&self, other: &Entry) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.value.cmp(&other.value))
    }

    /// True if `self` wins over `other` under [`lww_cmp`](Self::lww_cmp).
    pub fn supersedes(&self, other: &Entry) -> bool {
        self.lww_cmp(other) == Ordering::Greater
    }

    /// Digest record for this entry: `key:value:timestamp`.
    pub fn record(&self, key: &str) -> String {
        format!("{}:{}:{}", key, self.value, self.timestamp)
    }
}

/// Pick the winning entry under last-write-wins.
pub fn latest<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Option<&'a Entry> {
    entries.into_iter().max_by(|a, b| a.lww_cmp(b))
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, Entry>,
    /// Cached Merkle root; `None` after any mutation.
    digest: Option<Digest>,
}

/// Single-node authoritative store with a Merkle digest of its contents.
#[derive(Debug, Default)]
pub struct LocalStore {
    state: Mutex<StoreState>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point lookup.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Upsert, unconditionally replacing any existing entry, even one with a
    /// newer timestamp.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, timestamp: u64) {
        self.put(key, Entry::new(value, timestamp));
    }

    /// [`set`](Self::set) with a prebuilt entry.
    pub fn put(&self, key: impl Into<String>, entry: Entry) {
        let mut state = self.state.lock();
        state.entries.insert(key.into(), entry);
        state.digest = None;
    }

    /// Remove a key. No tombstone is kept.
    ///
    /// # Returns
    /// `true` if the key was present
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.digest = None;
        }
        removed
    }

    /// Merkle root over every `key:value:timestamp` record.
    ///
    /// Computed lazily on the first call after a mutation and cached until
    /// the next one. The result is identical to rebuilding after every write.
    pub fn digest(&self) -> Digest {
        let mut state = self.state.lock();
        if let Some(digest) = &state.digest {
            return digest.clone();
        }

        let tree = MerkleTree::new(state.entries.iter().map(|(key, entry)| entry.record(key)));
        let digest = tree.root().clone();
        state.digest = Some(digest.clone());
        digest
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}
