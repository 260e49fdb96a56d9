//! # RadixDB Storage
//!
//! Persistence backends for RadixDB.
//!
//! A backend is an **opaque byte store**: it appends, reads back, flushes and
//! truncates bytes. It knows nothing about tries, transactions or the commit
//! log layout; `radixdb_core` owns all interpretation of the stored bytes.
//!
//! ## Contract relied upon by the engine
//!
//! - A single `append` either lands completely or is detected as a torn tail
//!   by the reader of the bytes (the commit log checksums every record)
//! - After `flush`/`sync` return, appended bytes survive process exit
//! - Reopening a backend exposes exactly the bytes written before
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral storage, also used by tests
//! - [`FileBackend`] - persistent storage on a single OS file
//!
//! ## Example
//!
//! ```rust
//! use radixdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"batch").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"batch");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
