//! Arena nodes.

/// Index of a node in the trie arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const ROOT: NodeId = NodeId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        // The arena never holds more than u32::MAX nodes: a node costs far
        // more than 1 byte, so the address space runs out first.
        Self(index as u32)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Size accounting for values stored in a trie.
pub trait ByteSize {
    /// Bytes owned by the value on the heap.
    fn byte_size(&self) -> usize;
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

impl ByteSize for () {
    fn byte_size(&self) -> usize {
        0
    }
}

/// A trie node.
///
/// `label` is the edge label leading into this node (empty only for the
/// root). `children` is sorted by the first byte of each child's label, which
/// is cached next to the id so lookups never touch the child node.
#[derive(Debug, Clone)]
pub(crate) struct Node<V> {
    pub(crate) label: Vec<u8>,
    pub(crate) value: Option<V>,
    pub(crate) children: Vec<(u8, NodeId)>,
}

impl<V> Node<V> {
    pub(crate) fn empty() -> Self {
        Self {
            label: Vec::new(),
            value: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn leaf(label: Vec<u8>, value: V) -> Self {
        Self {
            label,
            value: Some(value),
            children: Vec::new(),
        }
    }

    pub(crate) fn branch(label: Vec<u8>, child: (u8, NodeId)) -> Self {
        Self {
            label,
            value: None,
            children: vec![child],
        }
    }

    /// Binary search for the child whose label starts with `byte`.
    ///
    /// `Err` carries the slot where such a child would be inserted.
    pub(crate) fn child_slot(&self, byte: u8) -> Result<usize, usize> {
        self.children.binary_search_by_key(&byte, |&(first, _)| first)
    }

    pub(crate) fn child(&self, slot: usize) -> NodeId {
        self.children[slot].1
    }
}

/// Length of the longest common prefix of `a` and `b`.
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_slot_reports_insert_position() {
        let mut node: Node<()> = Node::empty();
        node.children = vec![(b'b', NodeId(1)), (b'd', NodeId(2))];

        assert_eq!(node.child_slot(b'b'), Ok(0));
        assert_eq!(node.child_slot(b'a'), Err(0));
        assert_eq!(node.child_slot(b'c'), Err(1));
        assert_eq!(node.child_slot(b'z'), Err(2));
    }

    #[test]
    fn common_prefix() {
        assert_eq!(common_prefix_len(b"prefix-1", b"prefix-2"), 7);
        assert_eq!(common_prefix_len(b"abc", b"ab"), 2);
        assert_eq!(common_prefix_len(b"x", b"y"), 0);
    }
}
