//! Core type definitions for RadixDB.

use std::fmt;

/// Sequence number of a commit.
///
/// Every successful backend-bound commit gets the next sequence number, and
/// the number is stored in the commit log so it survives reopen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Positioning policy for seeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekMode {
    /// Exact match only.
    Eq,
    /// Smallest key greater than or equal to the target.
    Ge,
    /// Largest key less than or equal to the target.
    Le,
}

impl fmt::Display for SeekMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eq => "EQ",
            Self::Ge => "GE",
            Self::Le => "LE",
        };
        f.write_str(name)
    }
}

/// Returns the smallest byte string greater than every string starting with
/// `prefix`, or `None` when no such string exists (prefix is all `0xff`).
#[must_use]
pub(crate) fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last < u8::MAX {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}
