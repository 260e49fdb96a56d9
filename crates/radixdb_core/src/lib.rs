//! # RadixDB Core
//!
//! Transactional, ordered key-value engine built on a radix trie.
//!
//! This crate provides:
//! - [`RadixTrie`], an arena-backed radix trie with ordered traversal and seek
//! - RAM-only and database-bound [`Transaction`]s with atomic commit/rollback
//! - Bidirectional [`Cursor`]s with exact, `>=` and `<=` seek
//! - [`Database`], a durable handle backed by a checksummed commit log
//! - [`Params`], the option set tuning transactions and cursors
//!
//! ## Example
//!
//! ```rust
//! use radixdb_core::{Database, SeekMode};
//!
//! let db = Database::open_in_memory()?;
//!
//! let mut txn = db.transaction()?;
//! txn.begin()?;
//! txn.put(b"a", b"1")?;
//! txn.put(b"ab", b"2")?;
//! txn.put(b"b", b"3")?;
//! txn.commit()?;
//!
//! let mut reader = db.transaction()?;
//! reader.begin()?;
//! let cursor = reader.cursor_at(b"ab", SeekMode::Ge)?;
//! let keys: Vec<Vec<u8>> = cursor.forward().map(|entry| entry.map(|(k, _)| k)).collect::<Result<_, _>>()?;
//! assert_eq!(keys, vec![b"ab".to_vec(), b"b".to_vec()]);
//! # Ok::<(), radixdb_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod database;
mod error;
pub mod log;
mod params;
mod stats;
mod transaction;
pub mod trie;
mod types;

pub use cursor::{Backward, Cursor, Forward};
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use params::{Param, ParamValues, Params};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use transaction::{Iter, PendingWrite, Transaction, TransactionState};
pub use trie::{RadixTrie, TriePath};
pub use types::{SeekMode, SequenceNumber};
