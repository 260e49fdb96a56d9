//! Record-by-record reader over a commit log.

use super::record::{LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
use super::{CRC_SIZE, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use radixdb_storage::StorageBackend;

/// An iterator over the records of a commit log.
///
/// Yields `(offset, record)` pairs. Each record is read with two backend
/// reads (header, then body), so memory stays bounded by the largest record.
///
/// # Error Handling
///
/// - A truncated header or body ends iteration cleanly; [`LogIterator::is_torn`]
///   then reports that bytes past [`LogIterator::valid_end`] were discarded
/// - A length that runs past the end while a complete record still follows
///   is corruption, not a torn tail
/// - CRC mismatches, invalid magic, unsupported versions and unknown record
///   types yield an error and end iteration
pub struct LogIterator<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
    torn: bool,
}

impl<'a> LogIterator<'a> {
    /// Creates an iterator starting at `start_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend, start_offset: u64) -> CoreResult<Self> {
        Ok(Self {
            size: backend.size()?,
            backend,
            offset: start_offset,
            finished: false,
            torn: false,
        })
    }

    /// Offset just past the last complete record read so far.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    /// Whether iteration stopped at an incomplete trailing record.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.torn
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        let remaining = self.size.saturating_sub(start);
        if remaining < HEADER_SIZE as u64 {
            self.torn = remaining > 0;
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != LOG_MAGIC {
            return Err(CoreError::corrupted(format!("invalid magic at offset {start}")));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(CoreError::corrupted(format!(
                "unsupported version {version} at offset {start}"
            )));
        }
        let type_byte = header[6];
        let record_type = LogRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::corrupted(format!("unknown record type {type_byte} at offset {start}"))
        })?;
        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let total_len = (HEADER_SIZE + payload_len + CRC_SIZE) as u64;
        if remaining < total_len {
            if self.complete_record_after(start + HEADER_SIZE as u64)? {
                return Err(CoreError::corrupted(format!(
                    "record at offset {start} runs past the end of the log \
                     but complete records follow it"
                )));
            }
            self.torn = true;
            return Ok(None);
        }

        let body = self
            .backend
            .read_at(start + HEADER_SIZE as u64, payload_len + CRC_SIZE)?;
        let (payload, crc_bytes) = body.split_at(payload_len);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(payload);
        let actual = hasher.finalize();
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if actual != expected {
            return Err(CoreError::ChecksumMismatch {
                offset: start,
                expected,
                actual,
            });
        }

        let record = LogRecord::decode_payload(record_type, payload)?;
        self.offset = start + total_len;
        Ok(Some((start, record)))
    }

    /// Whether a checksummed record starts anywhere in `from..size`. A
    /// record cut short by a crash is always the last thing in the log.
    fn complete_record_after(&self, from: u64) -> CoreResult<bool> {
        let len = usize::try_from(self.size.saturating_sub(from))
            .map_err(|_| CoreError::corrupted("log tail does not fit in memory"))?;
        if len < HEADER_SIZE + CRC_SIZE {
            return Ok(false);
        }
        let tail = self.backend.read_at(from, len)?;
        let mut pos = 0;
        while let Some(found) = tail[pos..].windows(LOG_MAGIC.len()).position(|w| w == LOG_MAGIC) {
            let at = pos + found;
            if is_complete_frame(&tail[at..]) {
                return Ok(true);
            }
            pos = at + 1;
        }
        Ok(false)
    }
}

/// Whether `bytes` begins with a whole record whose CRC matches.
fn is_complete_frame(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE + CRC_SIZE {
        return false;
    }
    let payload_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
    let body_end = HEADER_SIZE + payload_len;
    let Some(crc_bytes) = bytes.get(body_end..body_end + CRC_SIZE) else {
        return false;
    };
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    crc32fast::hash(&bytes[..body_end]) == expected
}

impl Iterator for LogIterator<'_> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.read_next_record().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.finished = true;
        }
        result
    }
}

impl std::fmt::Debug for LogIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogIterator")
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
