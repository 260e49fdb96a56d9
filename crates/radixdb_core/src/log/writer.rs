//! Commit log writer and recovery.

use super::iterator::LogIterator;
use super::record::{LogRecord, LOG_MAGIC, LOG_VERSION};
use super::{CRC_SIZE, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::trie::RadixTrie;
use crate::types::SequenceNumber;
use radixdb_storage::StorageBackend;
use tracing::{debug, warn};

/// Frames a record: header, payload, CRC over both.
pub(crate) fn encode_record(record: &LogRecord) -> CoreResult<Vec<u8>> {
    let payload = record.encode_payload()?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_operation("log record payload too large"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.push(record.record_type().as_byte());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// State rebuilt from a commit log.
#[derive(Debug)]
pub struct Recovery {
    /// Committed key/value data.
    pub data: RadixTrie<Vec<u8>>,
    /// Sequence number of the last replayed commit.
    pub sequence: SequenceNumber,
    /// Number of records replayed.
    pub records: u64,
    /// Bytes of incomplete trailing record that were cut off.
    pub discarded: u64,
}

/// Append-only commit log over a storage backend.
pub struct CommitLog {
    backend: Box<dyn StorageBackend>,
}

impl CommitLog {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Appends a record and returns its offset. The data is not flushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn append(&mut self, record: &LogRecord) -> CoreResult<u64> {
        let data = encode_record(record)?;
        Ok(self.backend.append(&data)?)
    }

    /// Flushes buffered writes to the operating system.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    /// Flushes and fsyncs.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }

    /// Returns the current log size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Discards everything after `offset`.
    pub fn truncate(&mut self, offset: u64) -> CoreResult<()> {
        self.backend.truncate(offset)?;
        Ok(())
    }

    /// Returns an iterator over all records.
    pub fn iter(&self) -> CoreResult<LogIterator<'_>> {
        LogIterator::new(self.backend.as_ref(), 0)
    }

    /// Replays the log into a fresh trie.
    ///
    /// A snapshot record replaces everything before it; batches are applied
    /// in order. An incomplete trailing record (a crash mid-append) is cut
    /// off so later appends start on a record boundary.
    ///
    /// # Errors
    ///
    /// Returns an error on corruption (bad CRC, magic, version, record type
    /// or payload) or I/O failure.
    pub fn recover(&mut self) -> CoreResult<Recovery> {
        let mut data = RadixTrie::new();
        let mut sequence = SequenceNumber::default();
        let mut records = 0;

        let mut iter = self.iter()?;
        for result in iter.by_ref() {
            let (offset, record) = result?;
            sequence = sequence.max(record.sequence());
            records += 1;
            match record {
                LogRecord::Snapshot { entries, .. } => {
                    debug!(offset, entries = entries.len(), "replaying snapshot");
                    data.clear();
                    for (key, value) in entries {
                        if key.is_empty() {
                            return Err(CoreError::corrupted("empty key in snapshot"));
                        }
                        data.insert(&key, value);
                    }
                }
                LogRecord::Batch { ops, .. } => {
                    for op in ops {
                        op.apply(&mut data)?;
                    }
                }
            }
        }
        let torn = iter.is_torn();
        let valid_end = iter.valid_end();

        let mut discarded = 0;
        if torn {
            let size = self.size()?;
            discarded = size - valid_end;
            warn!(
                offset = valid_end,
                bytes = discarded,
                "discarding incomplete trailing log record"
            );
            self.truncate(valid_end)?;
        }

        Ok(Recovery {
            data,
            sequence,
            records,
            discarded,
        })
    }

    /// Returns the backend for tests that simulate crashes.
    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut dyn StorageBackend {
        self.backend.as_mut()
    }
}

impl std::fmt::Debug for CommitLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLog").finish_non_exhaustive()
    }
}
