//! Property-based test generators using proptest.
//!
//! Keys are drawn from a tiny alphabet (including `0x00` and `0xff`) so that
//! generated key sets share prefixes, split trie nodes and hit the ordering
//! edge cases that random bytes would rarely reach.

use proptest::prelude::*;
use radixdb_core::SeekMode;

/// Bytes keys are built from.
pub const KEY_ALPHABET: [u8; 5] = [0x00, b'a', b'b', b'c', 0xff];

/// Strategy for non-empty keys of up to `max_len` bytes.
pub fn key_strategy_with_len(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(KEY_ALPHABET.to_vec()), 1..=max_len.max(1))
}

/// Strategy for non-empty keys of up to six bytes.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    key_strategy_with_len(6)
}

/// Strategy for values, including empty ones.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

/// Strategy for seek modes.
pub fn seek_mode_strategy() -> impl Strategy<Value = SeekMode> {
    prop_oneof![Just(SeekMode::Eq), Just(SeekMode::Ge), Just(SeekMode::Le)]
}

/// One step of a generated transaction workload.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Buffer an insert or overwrite.
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Buffer a single-key delete.
    Delete {
        /// Key
        key: Vec<u8>,
    },
    /// Buffer a prefix delete.
    DeletePrefix {
        /// Prefix
        prefix: Vec<u8>,
    },
    /// Commit and begin again.
    Commit,
    /// Roll back and begin again.
    Rollback,
}

/// Strategy for generating workload operations.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        6 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| Operation::Put { key, value }),
        2 => key_strategy().prop_map(|key| Operation::Delete { key }),
        1 => key_strategy_with_len(2).prop_map(|prefix| Operation::DeletePrefix { prefix }),
        1 => Just(Operation::Commit),
        1 => Just(Operation::Rollback),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_are_non_empty_and_in_alphabet(key in key_strategy()) {
            prop_assert!(!key.is_empty() && key.len() <= 6);
            prop_assert!(key.iter().all(|b| KEY_ALPHABET.contains(b)));
        }

        #[test]
        fn prefixes_are_short(op in operation_strategy()) {
            if let Operation::DeletePrefix { prefix } = op {
                prop_assert!(!prefix.is_empty() && prefix.len() <= 2);
            }
        }
    }
}
