//! Crash recovery testing for RadixDB.
//!
//! [`FaultyBackend`] wraps a real backend and injects failures controlled
//! through a shared [`FaultControl`]: writes that stop after a byte budget
//! (leaving a partial record behind, like a crash mid-`write`) and failing
//! flush/sync calls. [`CrashRecoveryHarness`] uses it to check that
//!
//! 1. **Committed data survives** a reopen
//! 2. **A failed commit** leaves the database unchanged and the transaction
//!    retryable
//! 3. **Every truncation point** of the log reopens to a committed prefix
//!
//! ## Usage
//!
//! ```rust
//! use radixdb_testkit::crash::CrashRecoveryHarness;
//!
//! let mut harness = CrashRecoveryHarness::new().unwrap();
//! assert!(harness.test_committed_data_survives().passed);
//! assert!(harness.test_every_truncation_point().passed);
//! ```

use crate::fixtures::TempDb;
use radixdb_core::{CoreError, CoreResult, Database, Params};
use radixdb_storage::{FileBackend, StorageBackend, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// Description of what was tested.
    pub description: String,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Creates a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            error: None,
        }
    }

    /// Creates a failing result.
    pub fn fail(description: &str, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            error: Some(error.to_string()),
        }
    }
}

/// Failure switches shared between a test and its [`FaultyBackend`].
#[derive(Debug)]
pub struct FaultControl {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
}

impl Default for FaultControl {
    fn default() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
        }
    }
}

impl FaultControl {
    /// Lets `bytes` more bytes through, then fails every append.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Clears every injected failure.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_flush.store(false, Ordering::SeqCst);
    }

    /// Whether a failure has been injected since the last reset.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    fn simulated(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated crash during {what}"),
        ))
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    control: Arc<FaultControl>,
}

impl FaultyBackend {
    /// Wraps `inner`; returns the backend and its control handle.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, Arc<FaultControl>) {
        let control = Arc::new(FaultControl::default());
        let backend = Self {
            inner,
            control: Arc::clone(&control),
        };
        (backend, control)
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let current = self.control.bytes_written.load(Ordering::SeqCst);
        let threshold = self.control.crash_after_bytes.load(Ordering::SeqCst);

        if current >= threshold {
            return Err(self.control.simulated("write"));
        }
        if current.saturating_add(data.len()) > threshold {
            // Write up to the crash point.
            let partial = threshold - current;
            self.inner.append(&data[..partial])?;
            self.control.bytes_written.fetch_add(partial, Ordering::SeqCst);
            return Err(self.control.simulated("partial write"));
        }

        let offset = self.inner.append(data)?;
        self.control.bytes_written.fetch_add(data.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.control.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.control.simulated("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.control.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.control.simulated("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

/// Test harness for crash recovery scenarios.
pub struct CrashRecoveryHarness {
    temp: TempDb,
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
}

impl CrashRecoveryHarness {
    /// Creates a harness working in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            temp: TempDb::new()?,
            results: Vec::new(),
        })
    }

    /// Opens the harness database file through a [`FaultyBackend`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file is locked or holds a damaged log.
    pub fn open_faulty(&self) -> CoreResult<(Database, Arc<FaultControl>)> {
        let file = FileBackend::open_exclusive(self.temp.path())?;
        let (backend, control) = FaultyBackend::new(Box::new(file));
        let db = Database::open_with_backend(Box::new(backend), &Params::new())?;
        Ok((db, control))
    }

    /// Tests that committed data survives a reopen.
    pub fn test_committed_data_survives(&mut self) -> CrashRecoveryResult {
        const DESCRIPTION: &str = "committed data survives reopen";
        let outcome = (|| -> CoreResult<Option<String>> {
            self.temp.remove()?;
            let mut expected = BTreeMap::new();
            {
                let db = self.temp.open()?;
                for i in 0u8..10 {
                    let key = format!("key-{i}").into_bytes();
                    let value = vec![i; 100];
                    crate::fixtures::put_all(&db, [(key.as_slice(), value.as_slice())])?;
                    expected.insert(key, value);
                }

                // Uncommitted writes must not reach the log.
                let mut txn = db.transaction()?;
                txn.begin()?;
                txn.put(b"uncommitted", b"x")?;
            }

            let db = self.temp.open()?;
            let actual = crate::fixtures::read_all(&db)?;
            Ok((actual != expected).then(|| {
                format!("expected {} entries, found {}", expected.len(), actual.len())
            }))
        })();
        self.record(DESCRIPTION, outcome)
    }

    /// Tests that a commit whose write fails leaves nothing behind and can
    /// be retried.
    pub fn test_failed_commit_is_retryable(&mut self) -> CrashRecoveryResult {
        const DESCRIPTION: &str = "failed commit is retryable";
        let outcome = (|| -> CoreResult<Option<String>> {
            self.temp.remove()?;
            {
                let (db, control) = self.open_faulty()?;
                crate::fixtures::put_all(&db, [(&b"before"[..], &b"1"[..])])?;

                let mut txn = db.transaction()?;
                txn.begin()?;
                txn.put(b"retried", b"2")?;

                control.crash_after(7);
                if txn.commit().is_ok() {
                    return Ok(Some("commit succeeded despite the crash".into()));
                }
                if !txn.is_started() {
                    return Ok(Some("failed commit ended the transaction".into()));
                }

                control.reset();
                txn.commit()?;
            }

            let db = self.temp.open()?;
            let actual = crate::fixtures::read_all(&db)?;
            let expected: BTreeMap<Vec<u8>, Vec<u8>> = [
                (b"before".to_vec(), b"1".to_vec()),
                (b"retried".to_vec(), b"2".to_vec()),
            ]
            .into_iter()
            .collect();
            Ok((actual != expected).then(|| format!("unexpected contents {actual:?}")))
        })();
        self.record(DESCRIPTION, outcome)
    }

    /// Cuts the log at every byte offset and checks that each cut reopens
    /// to exactly the commits that fit before it.
    pub fn test_every_truncation_point(&mut self) -> CrashRecoveryResult {
        const DESCRIPTION: &str = "every truncation point recovers a committed prefix";
        let outcome = (|| -> CoreResult<Option<String>> {
            self.temp.remove()?;
            let mut states = vec![(0u64, BTreeMap::new())];
            {
                let db = self.temp.open()?;
                let mut model = BTreeMap::new();
                for i in 0u8..4 {
                    let key = vec![b'k', i % 2];
                    let value = vec![i; 3];
                    crate::fixtures::put_all(&db, [(key.as_slice(), value.as_slice())])?;
                    model.insert(key, value);
                    states.push((db.stats()?.log_size, model.clone()));
                }
            }

            let full = std::fs::read(self.temp.path())?;
            let cut_path = self.temp.dir().join("cut.rdb");
            for cut in 0..=full.len() {
                std::fs::write(&cut_path, &full[..cut])?;
                let db = Database::open(&cut_path)?;
                let actual = crate::fixtures::read_all(&db)?;
                let expected = states
                    .iter()
                    .rev()
                    .find(|(end, _)| *end <= cut as u64)
                    .map(|(_, state)| state.clone())
                    .unwrap_or_default();
                if actual != expected {
                    return Ok(Some(format!("cut at {cut} recovered {actual:?}")));
                }
            }
            Ok(None)
        })();
        self.record(DESCRIPTION, outcome)
    }

    /// Runs every scenario.
    pub fn run_all(&mut self) -> Vec<CrashRecoveryResult> {
        vec![
            self.test_committed_data_survives(),
            self.test_failed_commit_is_retryable(),
            self.test_every_truncation_point(),
        ]
    }

    fn record(
        &mut self,
        description: &str,
        outcome: Result<Option<String>, CoreError>,
    ) -> CrashRecoveryResult {
        let result = match outcome {
            Ok(None) => CrashRecoveryResult::pass(description),
            Ok(Some(problem)) => CrashRecoveryResult::fail(description, &problem),
            Err(err) => CrashRecoveryResult::fail(description, &err.to_string()),
        };
        self.results.push(result.clone());
        result
    }
}
