//! Ordered traversal over a [`RadixTrie`].
//!
//! A [`TriePath`] records the chain of nodes from the root to a position
//! together with the key spelled by that chain. Stepping forward or backward
//! only ever moves between neighbouring frames, so `next`/`prev` cost
//! amortized O(1) node visits without parent pointers in the arena.

use super::node::common_prefix_len;
use super::{NodeId, RadixTrie};
use crate::SeekMode;

/// A position in a [`RadixTrie`].
///
/// Paths are plain data: they do not borrow the trie and must only be used
/// with the trie (and version of it) that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriePath {
    /// `(node, slot in parent)` from the first level down; the root is implied.
    frames: Vec<(NodeId, usize)>,
    key: Vec<u8>,
}

impl TriePath {
    /// The key at this position.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Number of edges from the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn node(&self) -> NodeId {
        self.frames.last().map_or(NodeId::ROOT, |&(id, _)| id)
    }

    fn at_root(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<V> RadixTrie<V> {
    /// Value at `path`, or `None` if the path stops on a valueless node.
    #[must_use]
    pub fn value_at(&self, path: &TriePath) -> Option<&V> {
        if path.at_root() {
            return None;
        }
        self.node(path.node()).value.as_ref()
    }

    fn has_value(&self, path: &TriePath) -> bool {
        self.value_at(path).is_some()
    }

    fn push(&self, path: &mut TriePath, slot: usize) {
        let child = self.node(path.node()).child(slot);
        path.key.extend_from_slice(&self.node(child).label);
        path.frames.push((child, slot));
    }

    /// Drops the deepest frame, returning its slot in the parent.
    fn pop(&self, path: &mut TriePath) -> Option<usize> {
        let (id, slot) = path.frames.pop()?;
        let keep = path.key.len() - self.node(id).label.len();
        path.key.truncate(keep);
        Some(slot)
    }

    /// Moves to the smallest value at or below the current node.
    fn descend_first(&self, path: &mut TriePath) -> bool {
        loop {
            if self.has_value(path) {
                return true;
            }
            if self.node(path.node()).children.is_empty() {
                return false;
            }
            self.push(path, 0);
        }
    }

    /// Moves to the largest value at or below the current node.
    fn descend_last(&self, path: &mut TriePath) -> bool {
        loop {
            let count = self.node(path.node()).children.len();
            if count == 0 {
                break;
            }
            self.push(path, count - 1);
        }
        self.has_value(path)
    }

    /// Moves to the smallest value after the whole subtree of the current node.
    fn advance_past_subtree(&self, path: &mut TriePath) -> bool {
        while let Some(slot) = self.pop(path) {
            if slot + 1 < self.node(path.node()).children.len() {
                self.push(path, slot + 1);
                return self.descend_first(path);
            }
        }
        false
    }

    /// Moves to the largest value before the current node.
    ///
    /// Everything before a node is either in an earlier sibling's subtree or
    /// on an ancestor, since ancestors sort before their descendants.
    fn retreat_before(&self, path: &mut TriePath) -> bool {
        while let Some(slot) = self.pop(path) {
            if slot > 0 {
                self.push(path, slot - 1);
                return self.descend_last(path);
            }
            if self.has_value(path) {
                return true;
            }
        }
        false
    }

    /// Path to the smallest key.
    #[must_use]
    pub fn first(&self) -> Option<TriePath> {
        let mut path = TriePath::default();
        self.descend_first(&mut path).then_some(path)
    }

    /// Path to the largest key.
    #[must_use]
    pub fn last(&self) -> Option<TriePath> {
        let mut path = TriePath::default();
        self.descend_last(&mut path).then_some(path)
    }

    /// Steps `path` to the next key. On `false` the path is reset to the root.
    pub fn next(&self, path: &mut TriePath) -> bool {
        if self.node(path.node()).children.is_empty() {
            self.advance_past_subtree(path)
        } else {
            self.push(path, 0);
            self.descend_first(path)
        }
    }

    /// Steps `path` to the previous key. On `false` the path is reset to the root.
    pub fn prev(&self, path: &mut TriePath) -> bool {
        self.retreat_before(path)
    }

    /// Positions on `key` according to `mode`.
    ///
    /// The descent compares `key` against edge labels. At the first
    /// divergence the answer lies either in the subtree just reached or in a
    /// neighbour of it, depending on which side of `key` that subtree sorts.
    #[must_use]
    pub fn seek(&self, key: &[u8], mode: SeekMode) -> Option<TriePath> {
        let mut path = TriePath::default();
        let mut rest = key;
        loop {
            let node = self.node(path.node());
            let Some(&byte) = rest.first() else {
                if self.has_value(&path) {
                    return Some(path);
                }
                // Every key below this node extends `key`.
                let found = match mode {
                    SeekMode::Eq => false,
                    SeekMode::Ge => self.descend_first(&mut path),
                    SeekMode::Le => self.retreat_before(&mut path),
                };
                return found.then_some(path);
            };

            match node.child_slot(byte) {
                Ok(slot) => {
                    let label = &self.node(node.child(slot)).label;
                    let common = common_prefix_len(label, rest);
                    let label_len = label.len();
                    let subtree_greater = common < label_len
                        && (common == rest.len() || label[common] > rest[common]);
                    self.push(&mut path, slot);
                    if common == label_len {
                        rest = &rest[common..];
                        continue;
                    }
                    let found = match mode {
                        SeekMode::Eq => false,
                        SeekMode::Ge if subtree_greater => self.descend_first(&mut path),
                        SeekMode::Ge => self.advance_past_subtree(&mut path),
                        SeekMode::Le if subtree_greater => self.retreat_before(&mut path),
                        SeekMode::Le => self.descend_last(&mut path),
                    };
                    return found.then_some(path);
                }
                Err(slot) => {
                    let found = match mode {
                        SeekMode::Eq => false,
                        SeekMode::Ge if slot < node.children.len() => {
                            self.push(&mut path, slot);
                            self.descend_first(&mut path)
                        }
                        SeekMode::Ge => self.advance_past_subtree(&mut path),
                        SeekMode::Le if slot > 0 => {
                            self.push(&mut path, slot - 1);
                            self.descend_last(&mut path)
                        }
                        SeekMode::Le if self.has_value(&path) => true,
                        SeekMode::Le => self.retreat_before(&mut path),
                    };
                    return found.then_some(path);
                }
            }
        }
    }

    /// Path to the smallest key strictly greater than `key`.
    #[must_use]
    pub fn seek_after(&self, key: &[u8]) -> Option<TriePath> {
        let mut path = self.seek(key, SeekMode::Ge)?;
        if path.key() == key && !self.next(&mut path) {
            return None;
        }
        Some(path)
    }

    /// Path to the largest key strictly less than `key`.
    #[must_use]
    pub fn seek_before(&self, key: &[u8]) -> Option<TriePath> {
        let mut path = self.seek(key, SeekMode::Le)?;
        if path.key() == key && !self.prev(&mut path) {
            return None;
        }
        Some(path)
    }

    /// Iterates over `(key, value)` pairs in key order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            trie: self,
            front: self.first(),
            back: self.last(),
            remaining: self.len(),
        }
    }
}

impl<'a, V> IntoIterator for &'a RadixTrie<V> {
    type Item = (Vec<u8>, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Double-ended iterator over a trie, created by [`RadixTrie::iter`].
#[derive(Debug, Clone)]
pub struct Iter<'a, V> {
    trie: &'a RadixTrie<V>,
    front: Option<TriePath>,
    back: Option<TriePath>,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Vec<u8>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let trie = self.trie;
        let path = self.front.as_mut()?;
        let value = trie.value_at(path)?;
        let key = path.key().to_vec();
        if !trie.next(path) {
            self.front = None;
        }
        self.remaining -= 1;
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> DoubleEndedIterator for Iter<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let trie = self.trie;
        let path = self.back.as_mut()?;
        let value = trie.value_at(path)?;
        let key = path.key().to_vec();
        if !trie.prev(path) {
            self.back = None;
        }
        self.remaining -= 1;
        Some((key, value))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}
