//! Transactions.
//!
//! A [`Transaction`] buffers mutations in an overlay trie layered over a
//! baseline: an empty trie for RAM-only transactions, or a shared snapshot
//! of the committed data for backend-bound ones. Reads merge the two
//! without copying either:
//!
//! - **Read your writes**: buffered puts shadow baseline values
//! - **Snapshot reads**: the baseline is fixed when `begin()` runs
//! - **Atomic commit**: all buffered mutations reach the log in one record

mod handle;
mod state;
mod view;

pub use handle::{Iter, Transaction};
pub use state::{PendingWrite, TransactionState};
pub(crate) use view::{Entry, View};
