//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A backend storing all bytes in one OS file.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Locking
///
/// [`FileBackend::open_exclusive`] takes an advisory exclusive lock (via
/// `fs2`) that lives as long as the backend. A database opens its file this
/// way so that a second handle on the same path fails fast instead of
/// interleaving commits.
///
/// # Example
///
/// ```no_run
/// use radixdb_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open_exclusive(Path::new("data.rdb")).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
    locked: bool,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// An existing file is opened for reading and appending, its contents
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
            locked: false,
        })
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::open(path)
    }

    /// Opens the file and takes an exclusive advisory lock on it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds the lock,
    /// or an I/O error if the file cannot be opened.
    pub fn open_exclusive(path: &Path) -> StorageResult<Self> {
        let mut backend = Self::open_with_create_dirs(path)?;
        backend.try_lock_exclusive()?;
        Ok(backend)
    }

    /// Takes an exclusive advisory lock without blocking.
    ///
    /// The lock is released when the backend is dropped and its file closes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if the lock is held elsewhere.
    pub fn try_lock_exclusive(&mut self) -> StorageResult<()> {
        if self.locked {
            return Ok(());
        }
        let file = self.file.read();
        if FileExt::try_lock_exclusive(&*file).is_err() {
            return Err(StorageError::Locked {
                path: self.path.clone(),
            });
        }
        drop(file);
        self.locked = true;
        Ok(())
    }

    /// Returns whether this backend holds the exclusive lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.write().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.write().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size: *size,
            });
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.rdb");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
        assert!(!backend.is_locked());
    }

    #[test]
    fn append_returns_running_offsets() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("store.rdb")).unwrap();

        assert_eq!(backend.append(b"batch-1").unwrap(), 0);
        assert_eq!(backend.append(b"batch-2").unwrap(), 7);
        assert_eq!(backend.size().unwrap(), 14);
        assert_eq!(backend.read_at(7, 7).unwrap(), b"batch-2");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("store.rdb")).unwrap();
        backend.append(b"short").unwrap();

        let result = backend.read_at(3, 10);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn bytes_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.rdb");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"durable").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 7);
        assert_eq!(backend.read_at(0, 7).unwrap(), b"durable");
    }

    #[test]
    fn truncate_drops_tail_and_appends_continue_there() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("store.rdb")).unwrap();
        backend.append(b"good|torn").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.size().unwrap(), 5);

        let offset = backend.append(b"next").unwrap();
        assert_eq!(offset, 5);
        assert_eq!(backend.read_at(0, 9).unwrap(), b"good|next");
    }

    #[test]
    fn truncate_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("store.rdb")).unwrap();
        backend.append(b"abc").unwrap();

        let result = backend.truncate(10);
        assert!(matches!(result, Err(StorageError::TruncatePastEnd { .. })));
    }

    #[test]
    fn exclusive_open_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.rdb");

        let backend = FileBackend::open_exclusive(&path).unwrap();
        assert!(backend.is_locked());
        assert_eq!(backend.path(), path);
    }

    #[test]
    fn second_exclusive_open_is_rejected_until_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.rdb");

        let first = FileBackend::open_exclusive(&path).unwrap();
        let second = FileBackend::open_exclusive(&path);
        assert!(matches!(second, Err(StorageError::Locked { .. })));

        drop(first);
        assert!(FileBackend::open_exclusive(&path).is_ok());
    }
}
