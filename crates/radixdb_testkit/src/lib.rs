//! # RadixDB Testkit
//!
//! Test utilities for RadixDB.
//!
//! This crate provides:
//! - Temporary database files and fill/dump helpers
//! - Property-based test generators using proptest
//! - A `BTreeMap` reference model of transactional behaviour
//! - Crash recovery harnesses with fault-injecting backends
//!
//! ## Usage
//!
//! ```rust
//! use radixdb_testkit::prelude::*;
//!
//! with_memory_db(|db| {
//!     put_all(db, [(&b"key"[..], &b"value"[..])]).unwrap();
//!     assert_eq!(read_all(db).unwrap().len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
