//! Commit log record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::trie::RadixTrie;
use crate::types::SequenceNumber;

/// Magic bytes identifying a commit log record.
pub const LOG_MAGIC: [u8; 4] = *b"RXKV";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Mutations of one committed transaction.
    Batch = 1,
    /// Full image of the store, written by compaction.
    Snapshot = 2,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;
const OP_DELETE_PREFIX: u8 = 3;

/// One mutation inside a [`LogRecord::Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    /// Insert or overwrite a key.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove a single key.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
    /// Remove every key starting with a prefix.
    DeletePrefix {
        /// Prefix bytes.
        prefix: Vec<u8>,
    },
}

impl LogOp {
    /// Applies the mutation to `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] for a `Put` or `Delete` with an empty
    /// key, which no valid commit produces.
    pub fn apply(self, data: &mut RadixTrie<Vec<u8>>) -> CoreResult<()> {
        match self {
            Self::Put { key, .. } | Self::Delete { key } if key.is_empty() => {
                return Err(CoreError::corrupted("empty key in log op"));
            }
            Self::Put { key, value } => {
                data.insert(&key, value);
            }
            Self::Delete { key } => {
                data.remove(&key);
            }
            Self::DeletePrefix { prefix } => {
                data.remove_prefix(&prefix);
            }
        }
        Ok(())
    }
}

/// A commit log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Mutations of one committed transaction, applied in order.
    Batch {
        /// Sequence number assigned to the commit.
        sequence: SequenceNumber,
        /// Mutations.
        ops: Vec<LogOp>,
    },
    /// Every live entry at the time of compaction, in key order.
    Snapshot {
        /// Sequence number of the last commit folded into the snapshot.
        sequence: SequenceNumber,
        /// Live entries.
        entries: Vec<(Vec<u8>, Vec<u8>)>,
    },
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Batch { .. } => LogRecordType::Batch,
            Self::Snapshot { .. } => LogRecordType::Snapshot,
        }
    }

    /// Returns the sequence number carried by the record.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        match self {
            Self::Batch { sequence, .. } | Self::Snapshot { sequence, .. } => *sequence,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if a key, value or count does
    /// not fit the format's 32-bit length fields.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Batch { sequence, ops } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
                put_len(&mut buf, ops.len())?;
                for op in ops {
                    match op {
                        LogOp::Put { key, value } => {
                            buf.push(OP_PUT);
                            put_bytes(&mut buf, key)?;
                            put_bytes(&mut buf, value)?;
                        }
                        LogOp::Delete { key } => {
                            buf.push(OP_DELETE);
                            put_bytes(&mut buf, key)?;
                        }
                        LogOp::DeletePrefix { prefix } => {
                            buf.push(OP_DELETE_PREFIX);
                            put_bytes(&mut buf, prefix)?;
                        }
                    }
                }
            }
            Self::Snapshot { sequence, entries } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
                put_len(&mut buf, entries.len())?;
                for (key, value) in entries {
                    put_bytes(&mut buf, key)?;
                    put_bytes(&mut buf, value)?;
                }
            }
        }
        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] if the payload is short, carries an
    /// unknown op tag or has trailing bytes.
    pub fn decode_payload(record_type: LogRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader::new(payload);
        let sequence = SequenceNumber::new(reader.u64()?);
        let count = reader.u32()? as usize;

        let record = match record_type {
            LogRecordType::Batch => {
                // An op takes at least five bytes.
                let mut ops = Vec::with_capacity(count.min(payload.len() / 5));
                for _ in 0..count {
                    let op = match reader.u8()? {
                        OP_PUT => LogOp::Put {
                            key: reader.bytes()?,
                            value: reader.bytes()?,
                        },
                        OP_DELETE => LogOp::Delete {
                            key: reader.bytes()?,
                        },
                        OP_DELETE_PREFIX => LogOp::DeletePrefix {
                            prefix: reader.bytes()?,
                        },
                        tag => {
                            return Err(CoreError::corrupted(format!("unknown op tag {tag}")));
                        }
                    };
                    ops.push(op);
                }
                Self::Batch { sequence, ops }
            }
            LogRecordType::Snapshot => {
                let mut entries = Vec::with_capacity(count.min(payload.len() / 8));
                for _ in 0..count {
                    entries.push((reader.bytes()?, reader.bytes()?));
                }
                Self::Snapshot { sequence, entries }
            }
        };

        if !reader.is_exhausted() {
            return Err(CoreError::corrupted(format!(
                "trailing bytes in {:?} record: expected {} bytes, got {}",
                record_type,
                reader.position(),
                payload.len()
            )));
        }
        Ok(record)
    }
}

fn put_len(buf: &mut Vec<u8>, len: usize) -> CoreResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| CoreError::invalid_operation(format!("length {len} exceeds u32::MAX")))?;
    buf.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> CoreResult<()> {
    put_len(buf, bytes.len())?;
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Bounds-checked little-endian reader over a record payload.
struct PayloadReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.payload.len())
            .ok_or_else(|| CoreError::corrupted("unexpected end of payload"))?;
        let slice = &self.payload[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self) -> CoreResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> LogRecord {
        LogRecord::Batch {
            sequence: SequenceNumber::new(7),
            ops: vec![
                LogOp::DeletePrefix {
                    prefix: b"tmp/".to_vec(),
                },
                LogOp::Put {
                    key: b"answer".to_vec(),
                    value: b"42".to_vec(),
                },
                LogOp::Delete {
                    key: b"question".to_vec(),
                },
            ],
        }
    }

    #[test]
    fn ops_apply_in_order() {
        let mut data = RadixTrie::new();
        data.insert(b"tmp/1", b"x".to_vec());
        data.insert(b"question", b"?".to_vec());

        let LogRecord::Batch { ops, .. } = sample_batch() else {
            unreachable!()
        };
        for op in ops {
            op.apply(&mut data).unwrap();
        }

        let keys: Vec<_> = data.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"answer".to_vec()]);
    }

    #[test]
    fn empty_key_op_is_rejected() {
        let mut data = RadixTrie::new();
        let op = LogOp::Put {
            key: Vec::new(),
            value: b"v".to_vec(),
        };
        assert!(matches!(op.apply(&mut data), Err(CoreError::Corrupted { .. })));
    }

    #[test]
    fn record_type_bytes() {
        for t in [LogRecordType::Batch, LogRecordType::Snapshot] {
            assert_eq!(LogRecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(LogRecordType::from_byte(0), None);
    }

    #[test]
    fn batch_roundtrip() {
        let record = sample_batch();
        let payload = record.encode_payload().unwrap();
        let decoded = LogRecord::decode_payload(LogRecordType::Batch, &payload).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.sequence(), SequenceNumber::new(7));
    }

    #[test]
    fn snapshot_keeps_empty_values() {
        let record = LogRecord::Snapshot {
            sequence: SequenceNumber::new(3),
            entries: vec![(b"a".to_vec(), Vec::new()), (b"b".to_vec(), b"x".to_vec())],
        };
        let payload = record.encode_payload().unwrap();
        let decoded = LogRecord::decode_payload(LogRecordType::Snapshot, &payload).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn short_payload_is_corruption() {
        let payload = sample_batch().encode_payload().unwrap();
        let result = LogRecord::decode_payload(LogRecordType::Batch, &payload[..payload.len() - 1]);
        assert!(matches!(result, Err(CoreError::Corrupted { .. })));
    }

    #[test]
    fn trailing_bytes_are_corruption() {
        let mut payload = sample_batch().encode_payload().unwrap();
        payload.push(0);
        let result = LogRecord::decode_payload(LogRecordType::Batch, &payload);
        assert!(matches!(result, Err(CoreError::Corrupted { .. })));
    }

    #[test]
    fn unknown_op_tag_is_corruption() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u64.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.push(9);
        let result = LogRecord::decode_payload(LogRecordType::Batch, &payload);
        assert!(matches!(result, Err(CoreError::Corrupted { .. })));
    }

    #[test]
    fn huge_count_does_not_allocate_up_front() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u64.to_le_bytes());
        payload.extend_from_slice(&u32::MAX.to_le_bytes());
        let result = LogRecord::decode_payload(LogRecordType::Snapshot, &payload);
        assert!(result.is_err());
    }
}
