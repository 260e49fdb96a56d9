//! Radix trie index.
//!
//! [`RadixTrie`] maps non-empty byte-string keys to values. Nodes live in a
//! growable arena and refer to each other by [`NodeId`], so splitting and
//! merging never fight the borrow checker and cloning the whole index (for
//! copy-on-write snapshots) is a plain `Vec` clone.
//!
//! ## Invariants
//!
//! - The root has an empty label and never holds a value
//! - Every other node has a non-empty label
//! - Siblings never share the first byte of their labels
//! - Children are sorted by that first byte
//! - Every leaf holds a value
//! - No node other than the root is valueless with exactly one child
//!
//! Together these give a unique shape for a given key set, and make a
//! depth-first walk (node value before children, children in byte order)
//! yield keys in lexicographic order.

mod node;
mod path;

pub use node::{ByteSize, NodeId};
pub use path::{Iter, TriePath};

use node::{common_prefix_len, Node};
use std::collections::TryReserveError;

/// Approximate fixed cost of one node: the node itself plus its entry in the
/// parent's child table.
const NODE_OVERHEAD: usize =
    std::mem::size_of::<Node<()>>() + std::mem::size_of::<(u8, NodeId)>();

/// Most nodes [`RadixTrie::try_with_capacity`] callers should reserve up
/// front. Larger budgets still hold; the arena grows past this on demand.
pub const MAX_RESERVED_NODES: usize = 1 << 16;

/// An arena-backed radix trie.
///
/// # Example
///
/// ```rust
/// use radixdb_core::trie::RadixTrie;
///
/// let mut trie = RadixTrie::new();
/// trie.insert(b"prefix-1", b"one".to_vec());
/// trie.insert(b"prefix-2", b"two".to_vec());
/// assert_eq!(trie.get(b"prefix-2"), Some(&b"two".to_vec()));
/// assert_eq!(trie.remove_prefix(b"prefix"), 2);
/// assert!(trie.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct RadixTrie<V> {
    nodes: Vec<Node<V>>,
    free: Vec<NodeId>,
    len: usize,
    bytes: usize,
}

impl<V: ByteSize> Default for RadixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RadixTrie<V> {
    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of live nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Approximate heap footprint: labels, values and per-node overhead.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.bytes + self.node_count() * NODE_OVERHEAD
    }

    /// Upper bound on the memory a single insert of `key`/`value_size` adds:
    /// one new leaf, one new branch from a split, and the key bytes.
    #[must_use]
    pub fn insert_cost(key: &[u8], value_size: usize) -> usize {
        key.len() + value_size + 2 * NODE_OVERHEAD
    }

    /// Number of nodes an arena of `bytes` can hold.
    #[must_use]
    pub fn nodes_for_budget(bytes: usize) -> usize {
        bytes / NODE_OVERHEAD
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        &mut self.nodes[id.index()]
    }

    fn alloc(&mut self, node: Node<V>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId::from_index(self.nodes.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.nodes[id.index()] = Node::empty();
        self.free.push(id);
    }

    /// Locates the node whose full key is `key`.
    fn find(&self, key: &[u8]) -> Option<NodeId> {
        let mut node = NodeId::ROOT;
        let mut rest = key;
        while let Some(&byte) = rest.first() {
            let current = self.node(node);
            let child = current.child(current.child_slot(byte).ok()?);
            let label = &self.node(child).label;
            if !rest.starts_with(label) {
                return None;
            }
            rest = &rest[label.len()..];
            node = child;
        }
        Some(node)
    }

    /// Like [`RadixTrie::find`] but records `(parent, slot)` for each edge.
    fn trail_to(&self, key: &[u8]) -> Option<Vec<(NodeId, usize)>> {
        let mut trail = Vec::new();
        let mut node = NodeId::ROOT;
        let mut rest = key;
        while let Some(&byte) = rest.first() {
            let slot = self.node(node).child_slot(byte).ok()?;
            let child = self.node(node).child(slot);
            let label = &self.node(child).label;
            if !rest.starts_with(label) {
                return None;
            }
            rest = &rest[label.len()..];
            trail.push((node, slot));
            node = child;
        }
        Some(trail)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        if key.is_empty() {
            return None;
        }
        self.find(key).and_then(|id| self.node(id).value.as_ref())
    }

    /// Whether `key` is stored.
    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Length of the shortest stored key that is a prefix of `key`.
    #[must_use]
    pub fn prefix_len_of(&self, key: &[u8]) -> Option<usize> {
        let mut node = NodeId::ROOT;
        let mut depth = 0;
        loop {
            let current = self.node(node);
            if depth > 0 && current.value.is_some() {
                return Some(depth);
            }
            let byte = *key.get(depth)?;
            let child = current.child(current.child_slot(byte).ok()?);
            let label = &self.node(child).label;
            if !key[depth..].starts_with(label) {
                return None;
            }
            depth += label.len();
            node = child;
        }
    }

    /// Whether some stored key is a prefix of (or equal to) `key`.
    #[must_use]
    pub fn has_prefix_of(&self, key: &[u8]) -> bool {
        self.prefix_len_of(key).is_some()
    }

    /// Whether some stored key starts with `prefix`.
    #[must_use]
    pub fn has_keys_with_prefix(&self, prefix: &[u8]) -> bool {
        self.seek(prefix, crate::SeekMode::Ge)
            .is_some_and(|path| path.key().starts_with(prefix))
    }
}

impl<V: ByteSize> RadixTrie<V> {
    /// Creates an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    /// Creates an empty trie whose arena has room for `nodes` nodes.
    #[must_use]
    pub fn with_capacity(nodes: usize) -> Self {
        let mut arena = Vec::with_capacity(nodes.max(1));
        arena.push(Node::empty());
        Self {
            nodes: arena,
            free: Vec::new(),
            len: 0,
            bytes: 0,
        }
    }

    /// Like [`RadixTrie::with_capacity`], but reports allocation failure
    /// instead of aborting.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the arena cannot be reserved.
    pub fn try_with_capacity(nodes: usize) -> Result<Self, TryReserveError> {
        let mut arena = Vec::new();
        arena.try_reserve_exact(nodes.max(1))?;
        arena.push(Node::empty());
        Ok(Self {
            nodes: arena,
            free: Vec::new(),
            len: 0,
            bytes: 0,
        })
    }

    /// Removes every key, keeping the arena allocation.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0] = Node::empty();
        self.free.clear();
        self.len = 0;
        self.bytes = 0;
    }

    /// Inserts or overwrites `key`, returning the previous value.
    ///
    /// Overwriting replaces the value in place. A new key that diverges in
    /// the middle of an edge label splits that edge at the common prefix.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty; the root never holds a value.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        assert!(!key.is_empty(), "radix trie keys must be non-empty");

        let mut node = NodeId::ROOT;
        let mut rest = key;
        loop {
            let Some(&byte) = rest.first() else {
                self.bytes += value.byte_size();
                let previous = self.node_mut(node).value.replace(value);
                match &previous {
                    Some(old) => self.bytes -= old.byte_size(),
                    None => self.len += 1,
                }
                return previous;
            };

            match self.node(node).child_slot(byte) {
                Err(slot) => {
                    self.bytes += rest.len() + value.byte_size();
                    let leaf = self.alloc(Node::leaf(rest.to_vec(), value));
                    self.node_mut(node).children.insert(slot, (byte, leaf));
                    self.len += 1;
                    return None;
                }
                Ok(slot) => {
                    let child = self.node(node).child(slot);
                    let common = common_prefix_len(&self.node(child).label, rest);
                    if common < self.node(child).label.len() {
                        // Split the edge: `node -> mid(common) -> child(tail)`.
                        let mut head = std::mem::take(&mut self.node_mut(child).label);
                        let tail = head.split_off(common);
                        let tail_first = tail[0];
                        self.node_mut(child).label = tail;
                        let mid = self.alloc(Node::branch(head, (tail_first, child)));
                        self.node_mut(node).children[slot].1 = mid;
                        node = mid;
                    } else {
                        node = child;
                    }
                    rest = &rest[common..];
                }
            }
        }
    }

    /// Removes `key`, returning its value.
    ///
    /// Restores path compression on the way out: an emptied leaf is
    /// detached, and a valueless node left with a single child is merged
    /// into that child.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let trail = self.trail_to(key)?;
        let &(parent, slot) = trail.last()?;
        let target = self.node(parent).child(slot);
        let old = self.node_mut(target).value.take()?;
        self.len -= 1;
        self.bytes -= old.byte_size();
        self.settle(&trail);
        Some(old)
    }

    /// Removes every key starting with `prefix` and returns how many.
    ///
    /// The cut point is the shallowest node whose key starts with `prefix`:
    /// either the node matching `prefix` exactly or the child whose edge
    /// label runs past its end. That subtree is detached in one step.
    pub fn remove_prefix(&mut self, prefix: &[u8]) -> usize {
        if prefix.is_empty() {
            let removed = self.len;
            self.clear();
            return removed;
        }

        let mut trail = Vec::new();
        let mut node = NodeId::ROOT;
        let mut rest = prefix;
        loop {
            let Ok(slot) = self.node(node).child_slot(rest[0]) else {
                return 0;
            };
            let child = self.node(node).child(slot);
            let label = &self.node(child).label;
            trail.push((node, slot));
            if label.len() >= rest.len() {
                if !label.starts_with(rest) {
                    return 0;
                }
                break;
            }
            if !rest.starts_with(label) {
                return 0;
            }
            rest = &rest[label.len()..];
            node = child;
        }

        let Some((parent, slot)) = trail.pop() else {
            return 0;
        };
        let (_, cut) = self.node_mut(parent).children.remove(slot);
        let removed = self.release_subtree(cut);
        self.settle(&trail);
        removed
    }

    /// Frees a detached subtree and returns the number of values in it.
    fn release_subtree(&mut self, root: NodeId) -> usize {
        let mut stack = vec![root];
        let mut removed = 0;
        while let Some(id) = stack.pop() {
            let node = std::mem::replace(self.node_mut(id), Node::empty());
            self.bytes -= node.label.len();
            if let Some(value) = node.value {
                self.bytes -= value.byte_size();
                removed += 1;
            }
            stack.extend(node.children.iter().map(|&(_, child)| child));
            self.free.push(id);
        }
        self.len -= removed;
        removed
    }

    /// Restores the compression invariant for the node reached by `trail`.
    fn settle(&mut self, trail: &[(NodeId, usize)]) {
        let Some((&(parent, slot), above)) = trail.split_last() else {
            return;
        };
        let node = self.node(parent).child(slot);
        if self.node(node).value.is_some() {
            return;
        }
        match self.node(node).children.len() {
            0 => {
                self.node_mut(parent).children.remove(slot);
                self.bytes -= self.node(node).label.len();
                self.release(node);

                if let Some(&(grandparent, parent_slot)) = above.last() {
                    let parent_node = self.node(parent);
                    if parent_node.value.is_none() && parent_node.children.len() == 1 {
                        self.merge_with_only_child(grandparent, parent_slot);
                    }
                }
            }
            1 => self.merge_with_only_child(parent, slot),
            _ => {}
        }
    }

    /// Replaces the node at `parent[slot]` by its only child, prepending the
    /// node's label to the child's.
    fn merge_with_only_child(&mut self, parent: NodeId, slot: usize) {
        let node = self.node(parent).child(slot);
        let mut label = std::mem::take(&mut self.node_mut(node).label);
        let Some((_, child)) = self.node_mut(node).children.pop() else {
            return;
        };
        label.extend_from_slice(&self.node(child).label);
        self.node_mut(child).label = label;
        self.node_mut(parent).children[slot].1 = child;
        self.release(node);
    }
}
