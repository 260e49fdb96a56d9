//! Database handle: commit log ownership, recovery and commits.

use crate::error::{CoreError, CoreResult};
use crate::log::{CommitLog, LogOp, LogRecord};
use crate::params::{ParamValues, Params};
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::Transaction;
use crate::trie::RadixTrie;
use crate::types::SequenceNumber;
use parking_lot::RwLock;
use radixdb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared, copy-on-write committed data.
pub(crate) type Committed = Arc<RadixTrie<Vec<u8>>>;

/// State of an open database.
struct DbState {
    log: CommitLog,
    committed: Committed,
    sequence: SequenceNumber,
    replayed: u64,
}

/// A durable, ordered key-value store.
///
/// A `Database` owns one commit log (a file, or memory) and the committed
/// trie rebuilt from it. All reads and writes go through
/// [`Transaction`]s, which borrow the database: the borrow checker therefore
/// rejects closing a database while a transaction is alive.
///
/// # Opening a Database
///
/// ```rust,no_run
/// use radixdb_core::Database;
/// use std::path::Path;
///
/// let db = Database::open(Path::new("store.rdb"))?;
/// let mut txn = db.transaction()?;
/// txn.begin()?;
/// txn.put(b"greeting", b"hello")?;
/// txn.commit()?;
/// # Ok::<(), radixdb_core::CoreError>(())
/// ```
///
/// # Concurrency
///
/// Each transaction reads a snapshot taken at `begin()`. Commits are
/// serialized by an internal lock and applied on top of the latest committed
/// state, so concurrent transactions never block each other and the last
/// commit wins for any key both touched.
pub struct Database {
    path: Option<PathBuf>,
    params: ParamValues,
    state: RwLock<Option<DbState>>,
    stats: DatabaseStats,
}

impl Database {
    /// Opens or creates a database file with default parameters.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DatabaseLocked`] if another handle has the file open
    /// - [`CoreError::Corrupted`] / [`CoreError::ChecksumMismatch`] if the
    ///   log is damaged
    /// - I/O errors
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_params(path, &Params::new())
    }

    /// Opens or creates a database file.
    ///
    /// A missing or empty file yields an empty store. Otherwise the commit
    /// log is replayed; an incomplete trailing record left by a crash is
    /// discarded. `params` become the defaults of every transaction.
    ///
    /// # Errors
    ///
    /// See [`Database::open`]; also [`CoreError::NotInitialized`] if
    /// `params` was freed.
    pub fn open_with_params(path: &Path, params: &Params) -> CoreResult<Self> {
        let values = params.snapshot()?;
        let backend = FileBackend::open_exclusive(path)?;
        let db = Self::from_backend(Some(path.to_path_buf()), Box::new(backend), values)?;
        info!(path = %path.display(), sequence = %db.sequence()?, "opened database");
        Ok(db)
    }

    /// Creates an empty database that lives in memory.
    ///
    /// # Errors
    ///
    /// Infallible in practice; the signature matches the file-backed case.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), &Params::new())
    }

    /// Opens a database over an arbitrary backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend holds a damaged log or `params` was
    /// freed.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>, params: &Params) -> CoreResult<Self> {
        Self::from_backend(None, backend, params.snapshot()?)
    }

    fn from_backend(
        path: Option<PathBuf>,
        backend: Box<dyn StorageBackend>,
        params: ParamValues,
    ) -> CoreResult<Self> {
        let mut log = CommitLog::new(backend);
        let recovery = log.recover()?;
        debug!(
            records = recovery.records,
            entries = recovery.data.len(),
            discarded = recovery.discarded,
            "recovered commit log"
        );

        Ok(Self {
            path,
            params,
            state: RwLock::new(Some(DbState {
                log,
                committed: Arc::new(recovery.data),
                sequence: recovery.sequence,
                replayed: recovery.records,
            })),
            stats: DatabaseStats::new(),
        })
    }

    /// Flushes the log and releases the file. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails; the database is closed
    /// regardless.
    pub fn close(&mut self) -> CoreResult<()> {
        let Some(mut state) = self.state.get_mut().take() else {
            return Ok(());
        };
        let flushed = state.log.flush();
        drop(state);
        info!(path = ?self.path, "closed database");
        flushed
    }

    /// Whether the database is open.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.state.read().is_some()
    }

    /// The database file, or `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Default parameters of this database's transactions.
    #[must_use]
    pub fn params(&self) -> &ParamValues {
        &self.params
    }

    /// Creates a transaction with the database's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] if the database is closed, or
    /// the errors of [`Transaction::begin`] when `AutoBegin` is set.
    pub fn transaction(&self) -> CoreResult<Transaction<'_>> {
        self.ensure_open()?;
        Transaction::bound(self, self.params.clone())
    }

    /// Creates a transaction whose `params` override the database's.
    ///
    /// # Errors
    ///
    /// See [`Database::transaction`]; also [`CoreError::NotInitialized`] if
    /// `params` was freed.
    pub fn transaction_with_params(&self, params: &Params) -> CoreResult<Transaction<'_>> {
        self.ensure_open()?;
        let merged = self.params.merged_with(&params.snapshot()?);
        Transaction::bound(self, merged)
    }

    /// Sequence number of the last commit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] if the database is closed.
    pub fn sequence(&self) -> CoreResult<SequenceNumber> {
        self.with_state(|state| Ok(state.sequence))
    }

    /// Statistics for this database.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] if the database is closed.
    pub fn stats(&self) -> CoreResult<StatsSnapshot> {
        self.with_state(|state| {
            Ok(StatsSnapshot {
                entries: state.committed.len() as u64,
                sequence: state.sequence.as_u64(),
                log_size: state.log.size()?,
                memory_usage: state.committed.memory_usage() as u64,
                replayed_records: state.replayed,
                ..StatsSnapshot::default()
            }
            .with_counters(&self.stats))
        })
    }

    /// Rewrites the commit log as a single snapshot of the committed data.
    ///
    /// File databases write the snapshot to a sibling file, sync it and
    /// rename it over the log, so a crash leaves either the old or the new
    /// log in place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] if the database is closed, or an
    /// I/O error. If the compacted file cannot be reopened the database is
    /// closed.
    pub fn compact(&self) -> CoreResult<()> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(CoreError::DatabaseClosed)?;
        let before = state.log.size()?;

        let record = LogRecord::Snapshot {
            sequence: state.sequence,
            entries: state
                .committed
                .iter()
                .map(|(key, value)| (key, value.clone()))
                .collect(),
        };

        match &self.path {
            Some(path) => {
                let staging = staging_path(path);
                let mut staged = CommitLog::new(Box::new(FileBackend::open(&staging)?));
                staged.truncate(0)?;
                staged.append(&record)?;
                staged.sync()?;
                drop(staged);

                // Release the lock on the old file before replacing it.
                state.log = CommitLog::new(Box::new(InMemoryBackend::new()));
                let renamed = std::fs::rename(&staging, path);
                match FileBackend::open_exclusive(path) {
                    Ok(backend) => state.log = CommitLog::new(Box::new(backend)),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to reopen compacted log");
                        *guard = None;
                        return Err(err.into());
                    }
                }
                renamed?;
            }
            None => {
                state.log.truncate(0)?;
                state.log.append(&record)?;
                state.log.flush()?;
            }
        }

        self.stats.record_compaction();
        let after = state.log.size()?;
        info!(before, after, entries = state.committed.len(), "compacted commit log");
        Ok(())
    }

    /// Committed data and sequence number for a transaction's `begin()`.
    pub(crate) fn snapshot(&self) -> CoreResult<(Committed, SequenceNumber)> {
        let snapshot =
            self.with_state(|state| Ok((Arc::clone(&state.committed), state.sequence)))?;
        self.stats.record_begin();
        Ok(snapshot)
    }

    /// Makes one transaction's mutations durable, then visible.
    ///
    /// The batch is appended as a single record and flushed (and synced when
    /// `sync` is set) before the committed trie changes. If any step of the
    /// write fails the log is cut back to its previous size and nothing is
    /// applied. `snapshot` is released once the write has succeeded so the
    /// committed trie is updated in place when no other reader shares it.
    pub(crate) fn commit_batch(
        &self,
        ops: Vec<LogOp>,
        sync: bool,
        snapshot: &mut Committed,
    ) -> CoreResult<SequenceNumber> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(CoreError::DatabaseClosed)?;
        let sequence = state.sequence.next();
        let record = LogRecord::Batch { sequence, ops };

        let start = state.log.size()?;
        let written = state.log.append(&record).and_then(|_| {
            state.log.flush()?;
            if sync {
                state.log.sync()?;
            }
            Ok(())
        });
        if let Err(err) = written {
            self.stats.record_failed_commit();
            if let Err(cleanup) = state.log.truncate(start) {
                warn!(offset = start, error = %cleanup, "failed to cut back log after failed commit");
            }
            return Err(err);
        }
        let end = state.log.size()?;

        drop(std::mem::take(snapshot));
        let data = Arc::make_mut(&mut state.committed);
        if let LogRecord::Batch { ops, .. } = record {
            for op in ops {
                op.apply(data)?;
            }
        }
        state.sequence = sequence;

        self.stats.record_commit(end - start);
        debug!(%sequence, bytes = end - start, entries = data.len(), "committed batch");
        Ok(sequence)
    }

    pub(crate) fn record_rollback(&self) {
        self.stats.record_rollback();
    }

    fn with_state<T>(&self, f: impl FnOnce(&DbState) -> CoreResult<T>) -> CoreResult<T> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(CoreError::DatabaseClosed)?;
        f(state)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_opened() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(mut state) = self.state.get_mut().take() {
            if let Err(err) = state.log.flush() {
                warn!(error = %err, "failed to flush commit log on drop");
            }
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("opened", &self.is_opened())
            .finish_non_exhaustive()
    }
}

/// Sibling path used while compacting `path`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".compact");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Param;
    use tempfile::tempdir;

    fn put_all(db: &Database, pairs: &[(&str, &str)]) {
        let mut txn = db.transaction().unwrap();
        txn.begin().unwrap();
        for (k, v) in pairs {
            txn.put(k.as_bytes(), v.as_bytes()).unwrap();
        }
        txn.commit().unwrap();
    }

    fn read(db: &Database, key: &str) -> Option<Vec<u8>> {
        let mut txn = db.transaction().unwrap();
        txn.begin().unwrap();
        let value = txn.get_opt(key.as_bytes()).unwrap().map(<[u8]>::to_vec);
        txn.rollback().unwrap();
        value
    }

    #[test]
    fn open_creates_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.rdb");

        let db = Database::open(&path).unwrap();

        assert!(db.is_opened());
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
        assert_eq!(db.stats().unwrap().entries, 0);
    }

    #[test]
    fn reopen_restores_committed_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.rdb");

        {
            let mut db = Database::open(&path).unwrap();
            put_all(&db, &[("a", "1"), ("ab", "2"), ("b", "3")]);
            put_all(&db, &[("ab", "22")]);
            db.close().unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(read(&db, "a"), Some(b"1".to_vec()));
        assert_eq!(read(&db, "ab"), Some(b"22".to_vec()));
        assert_eq!(read(&db, "b"), Some(b"3".to_vec()));
        assert_eq!(db.sequence().unwrap(), SequenceNumber::new(2));
        assert_eq!(db.stats().unwrap().replayed_records, 2);
    }

    #[test]
    fn second_handle_is_locked_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.rdb");

        let _db = Database::open(&path).unwrap();
        assert!(matches!(
            Database::open(&path),
            Err(CoreError::DatabaseLocked)
        ));
    }

    #[test]
    fn close_releases_lock_and_rejects_use() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.rdb");

        let mut db = Database::open(&path).unwrap();
        db.close().unwrap();
        db.close().unwrap();

        assert!(!db.is_opened());
        assert!(matches!(db.transaction(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.sequence(), Err(CoreError::DatabaseClosed)));
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn torn_tail_is_discarded_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.rdb");
        {
            let db = Database::open(&path).unwrap();
            put_all(&db, &[("kept", "1")]);
        }
        let good_len = std::fs::metadata(&path).unwrap().len();
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"RXKV\x01\x00\x01\xff\x00").unwrap();
        }

        let db = Database::open(&path).unwrap();

        assert_eq!(read(&db, "kept"), Some(b"1".to_vec()));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn overlong_first_record_does_not_drop_later_commits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.rdb");
        {
            let db = Database::open(&path).unwrap();
            put_all(&db, &[("first", "1")]);
            put_all(&db, &[("second", "2")]);
            put_all(&db, &[("third", "3")]);
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let len = bytes.len() as u64;
        bytes[10] = 0x7f;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            Database::open(&path),
            Err(CoreError::Corrupted { .. })
        ));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
    }

    #[test]
    fn corrupted_log_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.rdb");
        {
            let db = Database::open(&path).unwrap();
            put_all(&db, &[("key", "value")]);
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let result = Database::open(&path);
        assert!(matches!(
            result,
            Err(CoreError::ChecksumMismatch { .. } | CoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn compact_keeps_data_and_shrinks_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.rdb");
        {
            let db = Database::open(&path).unwrap();
            for i in 0..20 {
                put_all(&db, &[("counter", &i.to_string())]);
            }
            let before = db.stats().unwrap().log_size;
            db.compact().unwrap();
            let stats = db.stats().unwrap();
            assert!(stats.log_size < before);
            assert_eq!(stats.compactions, 1);

            put_all(&db, &[("after", "x")]);
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(read(&db, "counter"), Some(b"19".to_vec()));
        assert_eq!(read(&db, "after"), Some(b"x".to_vec()));
        assert_eq!(db.sequence().unwrap(), SequenceNumber::new(21));
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn compact_in_memory() {
        let db = Database::open_in_memory().unwrap();
        put_all(&db, &[("a", "1")]);
        put_all(&db, &[("a", "2")]);

        db.compact().unwrap();

        assert_eq!(read(&db, "a"), Some(b"2".to_vec()));
        assert_eq!(db.stats().unwrap().entries, 1);
    }

    #[test]
    fn commits_are_last_writer_wins() {
        let db = Database::open_in_memory().unwrap();
        let mut first = db.transaction().unwrap();
        let mut second = db.transaction().unwrap();
        first.begin().unwrap();
        second.begin().unwrap();

        first.put(b"k", b"first").unwrap();
        second.put(b"k", b"second").unwrap();
        second.put(b"only-second", b"x").unwrap();
        first.commit().unwrap();
        second.commit().unwrap();

        assert_eq!(read(&db, "k"), Some(b"second".to_vec()));
        assert_eq!(read(&db, "only-second"), Some(b"x".to_vec()));
        assert_eq!(db.stats().unwrap().commits, 2);
    }

    #[test]
    fn database_params_are_transaction_defaults() {
        let params = Params::from_values([(Param::AutoBegin, 1)]).unwrap();
        let db = Database::open_with_backend(Box::new(InMemoryBackend::new()), &params).unwrap();

        let txn = db.transaction().unwrap();
        assert!(txn.is_started());

        let overrides = Params::from_values([(Param::AutoBegin, 0)]).unwrap();
        let txn = db.transaction_with_params(&overrides).unwrap();
        assert!(!txn.is_started());
    }

    #[test]
    fn empty_commit_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let mut txn = db.transaction().unwrap();
        txn.begin().unwrap();
        txn.commit().unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.log_size, 0);
        assert_eq!(stats.sequence, 0);
    }
}
