//! The transaction handle.

use super::state::{Overlay, PendingWrite, TransactionState};
use super::view::{Entry, View};
use crate::cursor::Cursor;
use crate::database::{Committed, Database};
use crate::error::{CoreError, CoreResult};
use crate::params::{ParamValues, Params};
use crate::trie::{RadixTrie, MAX_RESERVED_NODES};
use crate::types::{SeekMode, SequenceNumber};
use tracing::debug;

/// A unit of buffered reads and writes.
///
/// A transaction is either **RAM-only** (created by
/// [`Transaction::ram_only`]; its buffer is the only data and is dropped at
/// every commit, rollback or free) or **backend-bound** (created by
/// [`Database::transaction`]; `begin()` snapshots the committed data and
/// `commit()` makes the buffered mutations durable).
///
/// # Lifecycle
///
/// ```text
/// Initialized --begin--> Started --commit--> Committed --begin--> Started ...
///                           \----rollback--> RolledBack
/// any --free--> Freed
/// ```
///
/// Reads and writes need a started transaction ([`CoreError::NotStarted`]
/// otherwise). After a commit or rollback a RAM-only transaction still
/// answers reads against its now empty baseline, so `get` reports
/// [`CoreError::Empty`].
///
/// # Example
///
/// ```rust
/// use radixdb_core::{CoreError, Transaction};
///
/// let mut txn = Transaction::ram_only();
/// txn.begin()?;
/// txn.put(b"a", b"1")?;
/// assert_eq!(txn.get(b"a")?, b"1");
/// txn.commit()?;
/// assert!(matches!(txn.get(b"a"), Err(CoreError::Empty)));
/// # Ok::<(), CoreError>(())
/// ```
#[derive(Debug)]
pub struct Transaction<'db> {
    db: Option<&'db Database>,
    params: ParamValues,
    state: TransactionState,
    base: Committed,
    overlay: Option<Overlay>,
    snapshot: SequenceNumber,
}

impl Transaction<'static> {
    /// Creates a RAM-only transaction with default parameters.
    #[must_use]
    pub fn ram_only() -> Self {
        Self::new(None, ParamValues::default())
    }

    /// Creates a RAM-only transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] if `params` was freed, or the
    /// errors of [`Transaction::begin`] when `AutoBegin` is set.
    pub fn ram_only_with_params(params: &Params) -> CoreResult<Self> {
        Self::with_params(None, params.snapshot()?)
    }
}

impl<'db> Transaction<'db> {
    pub(crate) fn bound(db: &'db Database, params: ParamValues) -> CoreResult<Self> {
        Self::with_params(Some(db), params)
    }

    fn new(db: Option<&'db Database>, params: ParamValues) -> Self {
        Self {
            db,
            params,
            state: TransactionState::Initialized,
            base: Committed::default(),
            overlay: None,
            snapshot: SequenceNumber::default(),
        }
    }

    fn with_params(db: Option<&'db Database>, params: ParamValues) -> CoreResult<Self> {
        let mut txn = Self::new(db, params);
        if txn.params.auto_begin() {
            txn.begin()?;
        }
        Ok(txn)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// `false` once the transaction has been freed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state != TransactionState::Freed
    }

    /// Whether a begin cycle is in progress.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state == TransactionState::Started
    }

    /// Whether the transaction has no database behind it.
    #[must_use]
    pub fn is_ram_only(&self) -> bool {
        self.db.is_none()
    }

    /// Effective parameters (database defaults merged with overrides).
    #[must_use]
    pub fn params(&self) -> &ParamValues {
        &self.params
    }

    /// Sequence number of the committed state this begin cycle reads.
    #[must_use]
    pub fn snapshot_sequence(&self) -> SequenceNumber {
        self.snapshot
    }

    /// Bytes currently held by the mutation buffer.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.overlay.as_ref().map_or(0, Overlay::memory_usage)
    }

    /// Starts a begin cycle.
    ///
    /// Backend-bound transactions snapshot the database's committed data;
    /// the snapshot is shared, not copied.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotInitialized`] if the transaction was freed
    /// - [`CoreError::InvalidOperation`] if it is already started
    /// - [`CoreError::DatabaseClosed`] if the database was closed
    /// - [`CoreError::MemoryLimitExceeded`] if a fixed-allocation buffer
    ///   cannot be reserved
    pub fn begin(&mut self) -> CoreResult<()> {
        match self.state {
            TransactionState::Freed => return Err(CoreError::NotInitialized { what: "transaction" }),
            TransactionState::Started => {
                return Err(CoreError::invalid_operation("transaction already started"));
            }
            _ => {}
        }

        if let Some(db) = self.db {
            let (base, sequence) = db.snapshot()?;
            self.base = base;
            self.snapshot = sequence;
        }

        let overlay = match (self.params.dynamic_allocation(), self.params.memory_limit()) {
            (false, Some(limit)) => {
                let nodes = RadixTrie::<PendingWrite>::nodes_for_budget(limit)
                    .min(MAX_RESERVED_NODES);
                Overlay::try_with_capacity(nodes).map_err(|_| CoreError::MemoryLimitExceeded {
                    limit,
                    required: limit,
                })?
            }
            _ => Overlay::default(),
        };
        self.overlay = Some(overlay);
        self.state = TransactionState::Started;
        debug!(ram_only = self.is_ram_only(), snapshot = %self.snapshot, "transaction begun");
        Ok(())
    }

    /// Buffers an insert or overwrite of `key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotStarted`] / [`CoreError::NotInitialized`] per state
    /// - [`CoreError::Validation`] if `key` is empty
    /// - [`CoreError::MemoryLimitExceeded`] if the buffer would outgrow
    ///   `TransactionMemoryLimit`; the buffer is left unchanged
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let limit = self.params.memory_limit();
        let overlay = self.overlay_mut()?;
        validate_key(key)?;

        if let Some(limit) = limit {
            let required =
                overlay.memory_usage() + RadixTrie::<PendingWrite>::insert_cost(key, value.len());
            if required > limit {
                return Err(CoreError::MemoryLimitExceeded { limit, required });
            }
        }
        overlay.put(key, value.to_vec());
        Ok(())
    }

    /// Returns the value visible for `key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Empty`] if no key is visible at all
    /// - [`CoreError::NotFound`] if `key` is absent
    /// - [`CoreError::Validation`] if `key` is empty
    /// - [`CoreError::NotStarted`] / [`CoreError::NotInitialized`] per state
    pub fn get(&self, key: &[u8]) -> CoreResult<&[u8]> {
        let view = self.view()?;
        validate_key(key)?;
        match view.get(key) {
            Some(value) => Ok(value),
            None if view.is_empty() => Err(CoreError::Empty),
            None => Err(CoreError::NotFound),
        }
    }

    /// Buffers the removal of `key`, or with `prefix` set, of every key
    /// starting with `key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if `prefix` is unset and `key` is absent;
    ///   a prefix delete that matches nothing succeeds
    /// - [`CoreError::Validation`] if `key` is empty
    /// - [`CoreError::NotStarted`] / [`CoreError::NotInitialized`] per state
    pub fn delete(&mut self, key: &[u8], prefix: bool) -> CoreResult<()> {
        self.ensure_started()?;
        validate_key(key)?;
        let base: &RadixTrie<Vec<u8>> = &self.base;
        let Some(overlay) = self.overlay.as_mut() else {
            return Err(CoreError::NotStarted);
        };

        if prefix {
            overlay.delete_prefix(key, base);
            return Ok(());
        }
        if View::new(base, Some(&*overlay)).get(key).is_none() {
            return Err(CoreError::NotFound);
        }
        overlay.delete(key, base);
        Ok(())
    }

    /// Applies the buffered mutations and ends the begin cycle.
    ///
    /// Backend-bound transactions write one log record, flush it (and sync
    /// it under `SyncOnCommit`) and only then publish the changes. If that
    /// fails the transaction stays started with its buffer intact, so the
    /// caller may retry or roll back. RAM-only transactions drop the buffer.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotStarted`] / [`CoreError::NotInitialized`] per state
    /// - storage errors from the commit log
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_started()?;
        match (self.db, self.overlay.as_ref()) {
            (Some(db), Some(overlay)) if !overlay.is_empty() => {
                let ops = overlay.ops();
                let sequence = db.commit_batch(ops, self.params.sync_on_commit(), &mut self.base)?;
                debug!(%sequence, "transaction committed");
            }
            (Some(_), _) => debug!("nothing to commit"),
            (None, _) => debug!("ram-only transaction committed"),
        }
        self.finish(TransactionState::Committed);
        Ok(())
    }

    /// Discards the buffered mutations and ends the begin cycle.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotStarted`] / [`CoreError::NotInitialized`] per state.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_started()?;
        if let Some(db) = self.db {
            db.record_rollback();
        }
        self.finish(TransactionState::RolledBack);
        debug!("transaction rolled back");
        Ok(())
    }

    /// Releases the transaction. A started transaction is rolled back.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`] if already freed.
    pub fn free(&mut self) -> CoreResult<()> {
        if self.state == TransactionState::Freed {
            return Err(CoreError::NotInitialized { what: "transaction" });
        }
        if self.is_started() {
            self.rollback()?;
        }
        self.finish(TransactionState::Freed);
        Ok(())
    }

    /// Like [`Transaction::get`] but maps absence (and an empty view) to `None`.
    ///
    /// # Errors
    ///
    /// State and validation errors of [`Transaction::get`].
    pub fn get_opt(&self, key: &[u8]) -> CoreResult<Option<&[u8]>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_end_of_sequence() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether `key` is visible.
    ///
    /// # Errors
    ///
    /// State and validation errors of [`Transaction::get`].
    pub fn contains_key(&self, key: &[u8]) -> CoreResult<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    /// Iterates over visible `(key, value)` pairs in key order.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotStarted`] / [`CoreError::NotInitialized`] per state.
    pub fn iter(&self) -> CoreResult<Iter<'_>> {
        Ok(Iter::new(self.view()?))
    }

    /// Iterates over visible keys in order.
    ///
    /// # Errors
    ///
    /// See [`Transaction::iter`].
    pub fn keys(&self) -> CoreResult<impl DoubleEndedIterator<Item = Vec<u8>> + '_> {
        Ok(self.iter()?.map(|(key, _)| key))
    }

    /// Iterates over visible values in key order.
    ///
    /// # Errors
    ///
    /// See [`Transaction::iter`].
    pub fn values(&self) -> CoreResult<impl DoubleEndedIterator<Item = &[u8]> + '_> {
        Ok(self.iter()?.map(|(_, value)| value))
    }

    /// Number of visible keys. Walks the whole view.
    ///
    /// # Errors
    ///
    /// See [`Transaction::iter`].
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.iter()?.count())
    }

    /// Whether no key is visible.
    ///
    /// # Errors
    ///
    /// See [`Transaction::iter`].
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.view()?.is_empty())
    }

    /// Opens an unpositioned cursor over the visible keys.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotStarted`] / [`CoreError::NotInitialized`] per state.
    pub fn cursor(&self) -> CoreResult<Cursor<'_>> {
        Ok(Cursor::new(self.view()?, self.params.cursor_key_limit()))
    }

    /// Opens a cursor and seeks it to `key`.
    ///
    /// # Errors
    ///
    /// See [`Transaction::cursor`] and [`Cursor::seek`].
    pub fn cursor_at(&self, key: &[u8], mode: SeekMode) -> CoreResult<Cursor<'_>> {
        let mut cursor = self.cursor()?;
        cursor.seek(key, mode)?;
        Ok(cursor)
    }

    /// The merged view for reads.
    fn view(&self) -> CoreResult<View<'_>> {
        match self.state {
            TransactionState::Freed => Err(CoreError::NotInitialized { what: "transaction" }),
            TransactionState::Started => Ok(View::new(&self.base, self.overlay.as_ref())),
            TransactionState::Committed | TransactionState::RolledBack if self.is_ram_only() => {
                Ok(View::new(&self.base, None))
            }
            _ => Err(CoreError::NotStarted),
        }
    }

    fn ensure_started(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Freed => Err(CoreError::NotInitialized { what: "transaction" }),
            TransactionState::Started => Ok(()),
            _ => Err(CoreError::NotStarted),
        }
    }

    fn overlay_mut(&mut self) -> CoreResult<&mut Overlay> {
        match self.state {
            TransactionState::Freed => Err(CoreError::NotInitialized { what: "transaction" }),
            _ => self.overlay.as_mut().ok_or(CoreError::NotStarted),
        }
    }

    /// Drops the buffer and snapshot and moves to `state`.
    fn finish(&mut self, state: TransactionState) {
        self.overlay = None;
        self.base = Committed::default();
        self.state = state;
    }
}

fn validate_key(key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::validation("key must not be empty"));
    }
    Ok(())
}

/// Double-ended iterator over a transaction's visible entries, created by
/// [`Transaction::iter`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    view: View<'a>,
    front: Option<Vec<u8>>,
    back: Option<Vec<u8>>,
    done: bool,
}

impl<'a> Iter<'a> {
    fn new(view: View<'a>) -> Self {
        Self {
            view,
            front: None,
            back: None,
            done: false,
        }
    }

    fn settle(&mut self, entry: Option<Entry<'a>>, forward: bool) -> Option<Entry<'a>> {
        let Some(entry) = entry else {
            self.done = true;
            return None;
        };
        let (limit, own) = if forward {
            (&self.back, &mut self.front)
        } else {
            (&self.front, &mut self.back)
        };
        let crossed = limit.as_deref().is_some_and(|limit| {
            if forward {
                entry.0.as_slice() >= limit
            } else {
                entry.0.as_slice() <= limit
            }
        });
        if crossed {
            self.done = true;
            return None;
        }
        *own = Some(entry.0.clone());
        Some(entry)
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Vec<u8>, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let entry = match &self.front {
            None => self.view.first(),
            Some(key) => self.view.successor(key),
        };
        self.settle(entry, true)
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let entry = match &self.back {
            None => self.view.last(),
            Some(key) => self.view.predecessor(key),
        };
        self.settle(entry, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Param;

    fn started() -> Transaction<'static> {
        let mut txn = Transaction::ram_only();
        txn.begin().unwrap();
        txn
    }

    fn keys(txn: &Transaction<'_>) -> Vec<String> {
        txn.keys()
            .unwrap()
            .map(|k| String::from_utf8(k).unwrap())
            .collect()
    }

    #[test]
    fn lifecycle_errors() {
        let mut txn = Transaction::ram_only();
        assert_eq!(txn.state(), TransactionState::Initialized);
        assert!(matches!(txn.put(b"k", b"v"), Err(CoreError::NotStarted)));
        assert!(matches!(txn.get(b"k"), Err(CoreError::NotStarted)));
        assert!(matches!(txn.commit(), Err(CoreError::NotStarted)));
        assert!(matches!(txn.rollback(), Err(CoreError::NotStarted)));

        txn.begin().unwrap();
        assert!(matches!(
            txn.begin(),
            Err(CoreError::InvalidOperation { .. })
        ));

        txn.commit().unwrap();
        assert!(matches!(txn.commit(), Err(CoreError::NotStarted)));
        assert!(matches!(txn.rollback(), Err(CoreError::NotStarted)));

        txn.begin().unwrap();
        txn.rollback().unwrap();
        assert!(matches!(txn.rollback(), Err(CoreError::NotStarted)));
    }

    #[test]
    fn freed_transaction_rejects_everything() {
        let mut txn = started();
        txn.put(b"k", b"v").unwrap();
        txn.free().unwrap();

        assert!(!txn.is_initialized());
        assert!(matches!(txn.begin(), Err(CoreError::NotInitialized { .. })));
        assert!(matches!(txn.get(b"k"), Err(CoreError::NotInitialized { .. })));
        assert!(matches!(txn.put(b"k", b"v"), Err(CoreError::NotInitialized { .. })));
        assert!(matches!(txn.free(), Err(CoreError::NotInitialized { .. })));
    }

    #[test]
    fn get_distinguishes_empty_from_missing() {
        let mut txn = started();
        assert!(matches!(txn.get(b"a"), Err(CoreError::Empty)));

        txn.put(b"a", b"1").unwrap();
        assert!(matches!(txn.get(b"b"), Err(CoreError::NotFound)));
        assert_eq!(txn.get(b"a").unwrap(), b"1");
    }

    #[test]
    fn ram_only_commit_leaves_empty_baseline() {
        let mut txn = started();
        txn.put(b"a", b"1").unwrap();
        txn.commit().unwrap();

        assert!(matches!(txn.get(b"a"), Err(CoreError::Empty)));
        assert!(txn.is_empty().unwrap());

        txn.begin().unwrap();
        assert!(matches!(txn.get(b"a"), Err(CoreError::Empty)));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let mut txn = started();
        assert!(matches!(txn.put(b"", b"v"), Err(CoreError::Validation { .. })));
        assert!(matches!(txn.get(b""), Err(CoreError::Validation { .. })));
        assert!(matches!(txn.delete(b"", true), Err(CoreError::Validation { .. })));
    }

    #[test]
    fn last_put_wins_within_transaction() {
        let mut txn = started();
        txn.put(b"k", b"1").unwrap();
        txn.put(b"k", b"2").unwrap();
        assert_eq!(txn.get(b"k").unwrap(), b"2");
        assert_eq!(txn.len().unwrap(), 1);
    }

    #[test]
    fn delete_single_and_prefix() {
        let mut txn = started();
        for key in ["to-delete-1", "to-delete-2", "other-prefix", "a"] {
            txn.put(key.as_bytes(), b"v").unwrap();
        }

        txn.delete(b"a", false).unwrap();
        assert!(matches!(txn.get(b"a"), Err(CoreError::NotFound)));
        assert!(matches!(txn.delete(b"a", false), Err(CoreError::NotFound)));

        txn.delete(b"to-delete", true).unwrap();
        assert_eq!(keys(&txn), ["other-prefix"]);

        txn.delete(b"nothing-here", true).unwrap();
        assert_eq!(keys(&txn), ["other-prefix"]);
    }

    #[test]
    fn memory_limit_rejects_put_and_keeps_buffer() {
        let params = Params::from_values([(Param::TransactionMemoryLimit, 400)]).unwrap();
        let mut txn = Transaction::ram_only_with_params(&params).unwrap();
        txn.begin().unwrap();

        txn.put(b"small", b"v").unwrap();
        let before = txn.buffered_bytes();
        let result = txn.put(b"big", &[0u8; 1024]);

        assert!(matches!(
            result,
            Err(CoreError::MemoryLimitExceeded { limit: 400, .. })
        ));
        assert_eq!(txn.buffered_bytes(), before);
        assert!(matches!(txn.get(b"big"), Err(CoreError::NotFound)));
    }

    #[test]
    fn fixed_allocation_reserves_up_front() {
        let params = Params::from_values([
            (Param::DynamicAllocation, 0),
            (Param::TransactionMemoryLimit, 4096),
        ])
        .unwrap();
        let mut txn = Transaction::ram_only_with_params(&params).unwrap();
        txn.begin().unwrap();
        txn.put(b"k", b"v").unwrap();
        assert_eq!(txn.get(b"k").unwrap(), b"v");
    }

    #[test]
    fn fixed_allocation_with_huge_limit_begins() {
        for limit in [1_i64 << 40, i64::MAX] {
            let params = Params::from_values([
                (Param::DynamicAllocation, 0),
                (Param::TransactionMemoryLimit, limit),
            ])
            .unwrap();
            let mut txn = Transaction::ram_only_with_params(&params).unwrap();
            txn.begin().unwrap();
            txn.put(b"k", b"v").unwrap();
            assert_eq!(txn.get(b"k").unwrap(), b"v");
            txn.commit().unwrap();
        }
    }

    #[test]
    fn auto_begin_starts_on_construction() {
        let params = Params::from_values([(Param::AutoBegin, 1)]).unwrap();
        let mut txn = Transaction::ram_only_with_params(&params).unwrap();
        assert!(txn.is_started());
        txn.put(b"k", b"v").unwrap();
    }

    #[test]
    fn freed_params_fail_construction() {
        let mut params = Params::new();
        params.free().unwrap();
        assert!(matches!(
            Transaction::ram_only_with_params(&params),
            Err(CoreError::NotInitialized { .. })
        ));
    }

    #[test]
    fn iterator_is_double_ended() {
        let mut txn = started();
        for key in ["b", "a", "ab", "c"] {
            txn.put(key.as_bytes(), key.as_bytes()).unwrap();
        }

        let mut iter = txn.iter().unwrap();
        assert_eq!(iter.next().unwrap().0, b"a");
        assert_eq!(iter.next_back().unwrap().0, b"c");
        assert_eq!(iter.next_back().unwrap().0, b"b");
        assert_eq!(iter.next().unwrap().0, b"ab");
        assert!(iter.next().is_none());
        assert!(iter.next_back().is_none());

        let reversed: Vec<_> = txn.keys().unwrap().rev().collect();
        assert_eq!(reversed, vec![b"c".to_vec(), b"b".to_vec(), b"ab".to_vec(), b"a".to_vec()]);
        let values: Vec<_> = txn.values().unwrap().collect();
        assert_eq!(values, [&b"a"[..], &b"ab"[..], &b"b"[..], &b"c"[..]]);
    }

    #[test]
    fn free_of_started_transaction_rolls_back() {
        let mut txn = started();
        txn.put(b"k", b"v").unwrap();
        txn.free().unwrap();
        assert_eq!(txn.buffered_bytes(), 0);
        assert_eq!(txn.state(), TransactionState::Freed);
    }
}
