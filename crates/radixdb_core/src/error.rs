//! Error types for RadixDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in RadixDB core operations.
///
/// `Empty` and `NotFound` are ordinary outcomes: iteration code treats them
/// as end-of-sequence (see [`CoreError::is_end_of_sequence`]). The remaining
/// variants report programmer errors or storage failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The visible view holds no entries at all.
    #[error("no entries")]
    Empty,

    /// No entry qualifies for the lookup, seek or step.
    #[error("key not found")]
    NotFound,

    /// The transaction has not been started, or the cursor not positioned.
    #[error("not started")]
    NotStarted,

    /// The object was freed and can no longer be used.
    #[error("not initialized: {what} was freed")]
    NotInitialized {
        /// Which kind of object was used after free.
        what: &'static str,
    },

    /// Invalid input: empty key, unknown option identifier, bad value.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A buffered write would exceed the transaction memory limit.
    #[error("transaction memory limit of {limit} bytes exceeded (would use {required})")]
    MemoryLimitExceeded {
        /// Configured limit in bytes.
        limit: usize,
        /// Bytes the buffer would occupy after the write.
        required: usize,
    },

    /// A key is longer than the configured cursor key limit.
    #[error("key of {len} bytes exceeds the cursor key limit of {limit}")]
    LimitExceeded {
        /// Configured limit in bytes.
        limit: usize,
        /// Length of the offending key.
        len: usize,
    },

    /// The commit log is damaged.
    #[error("corrupted log: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected while reading the log.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged record.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Another handle holds the database file.
    #[error("database locked: another handle has exclusive access")]
    DatabaseLocked,

    /// The database has been closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(radixdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<radixdb_storage::StorageError> for CoreError {
    fn from(err: radixdb_storage::StorageError) -> Self {
        match err {
            radixdb_storage::StorageError::Locked { .. } => Self::DatabaseLocked,
            other => Self::Storage(other),
        }
    }
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Returns `true` for the errors that mean "nothing (more) to visit".
    #[must_use]
    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self, Self::Empty | Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_sequence_covers_empty_and_not_found() {
        assert!(CoreError::Empty.is_end_of_sequence());
        assert!(CoreError::NotFound.is_end_of_sequence());
        assert!(!CoreError::NotStarted.is_end_of_sequence());
        assert!(!CoreError::validation("empty key").is_end_of_sequence());
    }

    #[test]
    fn lock_errors_map_to_database_locked() {
        let err: CoreError = radixdb_storage::StorageError::Locked {
            path: "db.rdb".into(),
        }
        .into();
        assert!(matches!(err, CoreError::DatabaseLocked));
    }

    #[test]
    fn messages_name_the_problem() {
        let err = CoreError::NotInitialized { what: "cursor" };
        assert_eq!(err.to_string(), "not initialized: cursor was freed");

        let err = CoreError::MemoryLimitExceeded {
            limit: 10,
            required: 12,
        };
        assert!(err.to_string().contains("10 bytes"));
    }
}
