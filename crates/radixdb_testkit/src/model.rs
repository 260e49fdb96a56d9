//! Reference model for transactional key-value behaviour.
//!
//! [`Model`] mirrors a database plus one transaction with two `BTreeMap`s:
//! the committed state and the state visible inside the transaction. Tests
//! drive the real engine and the model with the same operations and compare
//! what each reports.

use crate::generators::Operation;
use radixdb_core::SeekMode;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered map from keys to values.
pub type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// Committed state plus one transaction's view of it.
#[derive(Debug, Clone, Default)]
pub struct Model {
    committed: Entries,
    visible: Entries,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model whose committed state is `entries`.
    pub fn with_committed(entries: Entries) -> Self {
        Self {
            visible: entries.clone(),
            committed: entries,
        }
    }

    /// Entries a reopened database would hold.
    pub fn committed(&self) -> &Entries {
        &self.committed
    }

    /// Entries visible inside the transaction.
    pub fn visible(&self) -> &Entries {
        &self.visible
    }

    /// Inserts or overwrites `key`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.visible.insert(key.to_vec(), value.to_vec());
    }

    /// Removes `key`; returns whether it was visible.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.visible.remove(key).is_some()
    }

    /// Removes every key starting with `prefix`; returns how many.
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let before = self.visible.len();
        self.visible.retain(|key, _| !key.starts_with(prefix));
        before - self.visible.len()
    }

    /// Publishes the visible state.
    pub fn commit(&mut self) {
        self.committed = self.visible.clone();
    }

    /// Discards the visible changes.
    pub fn rollback(&mut self) {
        self.visible = self.committed.clone();
    }

    /// Applies a generated operation.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::Put { key, value } => self.put(key, value),
            Operation::Delete { key } => {
                self.delete(key);
            }
            Operation::DeletePrefix { prefix } => {
                self.delete_prefix(prefix);
            }
            Operation::Commit => self.commit(),
            Operation::Rollback => self.rollback(),
        }
    }

    /// Value visible for `key`.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.visible.get(key).map(Vec::as_slice)
    }

    /// Entry a seek with `mode` should land on.
    pub fn seek(&self, key: &[u8], mode: SeekMode) -> Option<(&[u8], &[u8])> {
        let found = match mode {
            SeekMode::Eq => self.visible.get_key_value(key),
            SeekMode::Ge => self
                .visible
                .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next(),
            SeekMode::Le => self
                .visible
                .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
                .next_back(),
        };
        found.map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Visible keys in order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.visible.keys().cloned().collect()
    }
}
