//! Test fixtures and database helpers.
//!
//! Provides temporary database files and small helpers for filling and
//! dumping a database through ordinary transactions.

use radixdb_core::{CoreResult, Database, Params};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A database file in a temporary directory that is removed on drop.
///
/// The database itself is opened on demand, so tests can close and reopen
/// it to exercise recovery.
#[derive(Debug)]
pub struct TempDb {
    dir: TempDir,
    path: PathBuf,
}

impl TempDb {
    /// Creates a temporary directory; the database file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("test.rdb");
        Ok(Self { dir, path })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temporary directory holding the database file.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Opens (or creates) the database with default parameters.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn open(&self) -> CoreResult<Database> {
        Database::open(&self.path)
    }

    /// Opens (or creates) the database with `params`.
    ///
    /// # Errors
    ///
    /// See [`Database::open_with_params`].
    pub fn open_with_params(&self, params: &Params) -> CoreResult<Database> {
        Database::open_with_params(&self.path, params)
    }

    /// Current size of the database file, or zero if it does not exist.
    pub fn file_len(&self) -> u64 {
        std::fs::metadata(&self.path).map_or(0, |meta| meta.len())
    }

    /// Deletes the database file so the next open starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Runs a test with a fresh in-memory database.
///
/// # Panics
///
/// Panics if the database cannot be created.
pub fn with_memory_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let db = Database::open_in_memory().expect("failed to open in-memory database");
    f(&db)
}

/// Runs a test with a fresh file database; the file is removed afterwards.
///
/// # Panics
///
/// Panics if the temporary database cannot be created.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &TempDb) -> R,
{
    let temp = TempDb::new().expect("failed to create temp directory");
    let db = temp.open().expect("failed to open file database");
    f(&db, &temp)
}

/// Commits `pairs` in one transaction.
///
/// # Errors
///
/// Returns the first transaction error.
pub fn put_all<'a, I>(db: &Database, pairs: I) -> CoreResult<()>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let mut txn = db.transaction()?;
    if !txn.is_started() {
        txn.begin()?;
    }
    for (key, value) in pairs {
        txn.put(key, value)?;
    }
    txn.commit()
}

/// Reads every committed entry.
///
/// # Errors
///
/// Returns the first transaction error.
pub fn read_all(db: &Database) -> CoreResult<BTreeMap<Vec<u8>, Vec<u8>>> {
    let mut txn = db.transaction()?;
    if !txn.is_started() {
        txn.begin()?;
    }
    let entries = txn
        .iter()?
        .map(|(key, value)| (key, value.to_vec()))
        .collect();
    txn.rollback()?;
    Ok(entries)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// The keys `"a"`, `"ab"` and `"b"` with values `"1"`, `"2"` and `"3"`.
    pub const SMALL: [(&str, &str); 3] = [("a", "1"), ("ab", "2"), ("b", "3")];

    /// A database holding `count` keys `key-00000`, `key-00001`, ...
    ///
    /// # Panics
    ///
    /// Panics if the in-memory database cannot be populated.
    pub fn populated_database(count: usize) -> Database {
        let db = Database::open_in_memory().expect("failed to open in-memory database");
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0..count)
            .map(|i| {
                (
                    format!("key-{i:05}").into_bytes(),
                    format!("value-{i}").into_bytes(),
                )
            })
            .collect();
        put_all(&db, pairs.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))
            .expect("failed to populate database");
        db
    }

    /// A database holding [`SMALL`].
    ///
    /// # Panics
    ///
    /// Panics if the in-memory database cannot be populated.
    pub fn small_database() -> Database {
        let db = Database::open_in_memory().expect("failed to open in-memory database");
        put_all(&db, SMALL.iter().map(|(k, v)| (k.as_bytes(), v.as_bytes())))
            .expect("failed to populate database");
        db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_db_reopens_same_file() {
        let temp = TempDb::new().unwrap();
        assert_eq!(temp.file_len(), 0);
        {
            let db = temp.open().unwrap();
            put_all(&db, [(&b"k"[..], &b"v"[..])]).unwrap();
        }
        assert!(temp.file_len() > 0);

        let db = temp.open().unwrap();
        assert_eq!(read_all(&db).unwrap().get(&b"k"[..]), Some(&b"v".to_vec()));
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = TempDb::new().unwrap();
        temp.remove().unwrap();
        drop(temp.open().unwrap());
        temp.remove().unwrap();
        assert_eq!(temp.file_len(), 0);
    }

    #[test]
    fn populated_scenario() {
        let db = scenarios::populated_database(25);
        let all = read_all(&db).unwrap();
        assert_eq!(all.len(), 25);
        assert_eq!(all.keys().next().unwrap(), b"key-00000");
    }

    #[test]
    fn with_helpers_provide_databases() {
        with_memory_db(|db| assert!(db.path().is_none()));
        with_file_db(|db, temp| assert_eq!(db.path(), Some(temp.path())));
    }
}
