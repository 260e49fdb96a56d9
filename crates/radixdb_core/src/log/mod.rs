//! Commit log for durability and crash recovery.
//!
//! Every backend-bound commit appends one [`LogRecord::Batch`] holding the
//! transaction's net mutations. Opening a database replays the log; compaction
//! rewrites it as a single [`LogRecord::Snapshot`].
//!
//! ## Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The CRC covers header and payload.
//!
//! ## Recovery Policy
//!
//! - A truncated header or payload at the end of the log is a crash
//!   mid-append: the partial record is discarded and recovery proceeds
//! - A record whose length runs past the end of the log while a complete
//!   record follows it is corruption: opening fails instead of discarding
//!   committed batches
//! - A CRC mismatch, invalid magic, future version or unknown record type is
//!   corruption: opening fails
//!
//! A commit is durable once its batch record is fully written, so a torn
//! record never belongs to an acknowledged commit.

mod iterator;
mod record;
mod writer;

pub use iterator::LogIterator;
pub use record::{LogOp, LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
pub use writer::{CommitLog, Recovery};

/// magic (4) + version (2) + type (1) + length (4)
const HEADER_SIZE: usize = 11;

const CRC_SIZE: usize = 4;
