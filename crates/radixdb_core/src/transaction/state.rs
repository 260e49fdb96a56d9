//! Transaction state and the buffered mutation overlay.

use crate::log::LogOp;
use crate::trie::{ByteSize, RadixTrie};
use std::collections::TryReserveError;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Constructed, `begin()` not called yet.
    Initialized,
    /// Buffering mutations.
    Started,
    /// The last begin cycle ended with a commit.
    Committed,
    /// The last begin cycle ended with a rollback.
    RolledBack,
    /// Released; every call fails.
    Freed,
}

/// A buffered mutation of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Insert or overwrite.
    Put(Vec<u8>),
    /// Hide the committed value.
    Delete,
}

impl ByteSize for PendingWrite {
    fn byte_size(&self) -> usize {
        match self {
            Self::Put(value) => value.len(),
            Self::Delete => 0,
        }
    }
}

/// Mutations buffered by a started transaction, layered over its base.
///
/// `writes` holds puts and tombstones. `dropped` holds prefixes removed by
/// prefix deletes: a base key under a dropped prefix is hidden unless
/// `writes` has a put for it. Prefix deletes clear the `writes` below them,
/// so every write in the overlay is newer than every dropped prefix.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overlay {
    pub(crate) writes: RadixTrie<PendingWrite>,
    pub(crate) dropped: RadixTrie<()>,
}

impl Overlay {
    pub(crate) fn try_with_capacity(nodes: usize) -> Result<Self, TryReserveError> {
        Ok(Self {
            writes: RadixTrie::try_with_capacity(nodes)?,
            dropped: RadixTrie::new(),
        })
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.writes.memory_usage() + self.dropped.memory_usage()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.dropped.is_empty()
    }

    /// Whether `key` is hidden from the base by a prefix delete.
    pub(crate) fn hides(&self, key: &[u8]) -> bool {
        self.dropped.has_prefix_of(key)
    }

    pub(crate) fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.writes.insert(key, PendingWrite::Put(value));
    }

    /// Buffers a single-key delete.
    ///
    /// A tombstone is only needed when the base value is still visible.
    pub(crate) fn delete(&mut self, key: &[u8], base: &RadixTrie<Vec<u8>>) {
        if base.contains_key(key) && !self.hides(key) {
            self.writes.insert(key, PendingWrite::Delete);
        } else {
            self.writes.remove(key);
        }
    }

    /// Buffers a prefix delete. `prefix` must be non-empty.
    pub(crate) fn delete_prefix(&mut self, prefix: &[u8], base: &RadixTrie<Vec<u8>>) {
        self.writes.remove_prefix(prefix);
        if base.has_keys_with_prefix(prefix) && !self.hides(prefix) {
            self.dropped.remove_prefix(prefix);
            self.dropped.insert(prefix, ());
        }
    }

    /// Log ops reproducing the overlay on top of a committed trie.
    ///
    /// Prefix deletes come first so the writes made after them survive.
    pub(crate) fn ops(&self) -> Vec<LogOp> {
        let mut ops = Vec::with_capacity(self.dropped.len() + self.writes.len());
        ops.extend(self.dropped.iter().map(|(prefix, _)| LogOp::DeletePrefix { prefix }));
        ops.extend(self.writes.iter().map(|(key, write)| match write {
            PendingWrite::Put(value) => LogOp::Put {
                key,
                value: value.clone(),
            },
            PendingWrite::Delete => LogOp::Delete { key },
        }));
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_of(keys: &[&str]) -> RadixTrie<Vec<u8>> {
        let mut base = RadixTrie::new();
        for key in keys {
            base.insert(key.as_bytes(), b"base".to_vec());
        }
        base
    }

    #[test]
    fn delete_of_unknown_key_leaves_no_tombstone() {
        let base = base_of(&["a"]);
        let mut overlay = Overlay::default();

        overlay.put(b"b", b"1".to_vec());
        overlay.delete(b"b", &base);

        assert!(overlay.is_empty());
    }

    #[test]
    fn delete_of_base_key_leaves_tombstone() {
        let base = base_of(&["a"]);
        let mut overlay = Overlay::default();

        overlay.delete(b"a", &base);

        assert_eq!(overlay.writes.get(b"a"), Some(&PendingWrite::Delete));
        assert_eq!(
            overlay.ops(),
            vec![LogOp::Delete {
                key: b"a".to_vec()
            }]
        );
    }

    #[test]
    fn prefix_delete_clears_writes_and_records_prefix() {
        let base = base_of(&["tmp/1", "keep"]);
        let mut overlay = Overlay::default();
        overlay.put(b"tmp/2", b"x".to_vec());

        overlay.delete_prefix(b"tmp/", &base);
        overlay.put(b"tmp/3", b"y".to_vec());

        assert!(overlay.hides(b"tmp/1"));
        assert!(!overlay.hides(b"keep"));
        assert_eq!(
            overlay.ops(),
            vec![
                LogOp::DeletePrefix {
                    prefix: b"tmp/".to_vec()
                },
                LogOp::Put {
                    key: b"tmp/3".to_vec(),
                    value: b"y".to_vec()
                },
            ]
        );
    }

    #[test]
    fn prefix_delete_without_base_match_records_nothing() {
        let base = base_of(&["keep"]);
        let mut overlay = Overlay::default();
        overlay.delete_prefix(b"tmp/", &base);
        assert!(overlay.is_empty());
    }

    #[test]
    fn shorter_prefix_absorbs_longer() {
        let base = base_of(&["ab1", "ac"]);
        let mut overlay = Overlay::default();

        overlay.delete_prefix(b"ab", &base);
        overlay.delete_prefix(b"a", &base);

        let prefixes: Vec<_> = overlay.dropped.iter().map(|(p, _)| p).collect();
        assert_eq!(prefixes, vec![b"a".to_vec()]);
    }

    #[test]
    fn tombstones_count_toward_memory() {
        let base = base_of(&["a"]);
        let mut overlay = Overlay::default();
        let empty = overlay.memory_usage();
        overlay.delete(b"a", &base);
        assert!(overlay.memory_usage() > empty);
    }
}
