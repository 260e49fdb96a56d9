//! Cursors over a transaction's visible keys.
//!
//! A [`Cursor`] holds only its own position: the key it is on and a borrow
//! of the value. Stepping re-probes the transaction's merged view from that
//! key, so any number of cursors can walk the same transaction
//! independently.

use crate::error::{CoreError, CoreResult};
use crate::transaction::{Entry, View};
use crate::types::SeekMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Initialized,
    Positioned,
    Freed,
}

/// A bidirectional cursor, created by
/// [`Transaction::cursor`](crate::Transaction::cursor).
///
/// Positioning errors never move the cursor: after `next()` reports
/// [`CoreError::NotFound`] at the last key, the cursor still points there.
///
/// # Example
///
/// ```rust
/// use radixdb_core::{CoreError, SeekMode, Transaction};
///
/// let mut txn = Transaction::ram_only();
/// txn.begin()?;
/// for (k, v) in [("a", "1"), ("ab", "2"), ("b", "3")] {
///     txn.put(k.as_bytes(), v.as_bytes())?;
/// }
///
/// let mut cursor = txn.cursor()?;
/// cursor.first()?;
/// assert_eq!(cursor.key()?, b"a");
/// cursor.next()?;
/// assert_eq!(cursor.key()?, b"ab");
///
/// cursor.seek(b"b", SeekMode::Le)?;
/// assert_eq!(cursor.val()?, b"3");
/// assert!(matches!(cursor.next(), Err(CoreError::NotFound)));
/// # Ok::<(), CoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Cursor<'t> {
    view: View<'t>,
    key_limit: Option<usize>,
    state: CursorState,
    current: Option<Entry<'t>>,
    /// The current entry has not been yielded by an iteration adapter yet.
    fresh: bool,
    /// Iteration hit an error and yields nothing more.
    halted: bool,
}

impl<'t> Cursor<'t> {
    pub(crate) fn new(view: View<'t>, key_limit: Option<usize>) -> Self {
        Self {
            view,
            key_limit,
            state: CursorState::Initialized,
            current: None,
            fresh: false,
            halted: false,
        }
    }

    /// Whether the cursor has been positioned at least once.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state == CursorState::Positioned
    }

    /// `false` once the cursor has been freed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state != CursorState::Freed
    }

    /// Moves to the smallest visible key.
    ///
    /// # Errors
    ///
    /// [`CoreError::Empty`] if nothing is visible.
    pub fn first(&mut self) -> CoreResult<()> {
        self.ensure_initialized()?;
        let entry = self.view.first().ok_or(CoreError::Empty)?;
        self.place(entry)
    }

    /// Moves to the largest visible key.
    ///
    /// # Errors
    ///
    /// [`CoreError::Empty`] if nothing is visible.
    pub fn last(&mut self) -> CoreResult<()> {
        self.ensure_initialized()?;
        let entry = self.view.last().ok_or(CoreError::Empty)?;
        self.place(entry)
    }

    /// Moves to the next key.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] at the last key or on a cursor that was never
    /// positioned.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> CoreResult<()> {
        self.ensure_initialized()?;
        let key = self.current_key().ok_or(CoreError::NotFound)?;
        let entry = self.view.successor(key).ok_or(CoreError::NotFound)?;
        self.place(entry)
    }

    /// Moves to the previous key.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] at the first key or on a cursor that was never
    /// positioned.
    pub fn prev(&mut self) -> CoreResult<()> {
        self.ensure_initialized()?;
        let key = self.current_key().ok_or(CoreError::NotFound)?;
        let entry = self.view.predecessor(key).ok_or(CoreError::NotFound)?;
        self.place(entry)
    }

    /// Positions the cursor relative to `key`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Empty`] if nothing is visible
    /// - [`CoreError::NotFound`] if no key qualifies under `mode`
    /// - [`CoreError::Validation`] if `key` is empty
    pub fn seek(&mut self, key: &[u8], mode: SeekMode) -> CoreResult<()> {
        self.ensure_initialized()?;
        if key.is_empty() {
            return Err(CoreError::validation("key must not be empty"));
        }
        match self.view.seek(key, mode) {
            Some(entry) => self.place(entry),
            None if self.view.is_empty() => Err(CoreError::Empty),
            None => Err(CoreError::NotFound),
        }
    }

    /// Key at the current position.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotStarted`] before the cursor is positioned.
    pub fn key(&self) -> CoreResult<&[u8]> {
        Ok(self.entry()?.0.as_slice())
    }

    /// Value at the current position.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotStarted`] before the cursor is positioned.
    pub fn val(&self) -> CoreResult<&'t [u8]> {
        Ok(self.entry()?.1)
    }

    /// Length of the current key.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotStarted`] before the cursor is positioned.
    pub fn keysize(&self) -> CoreResult<usize> {
        Ok(self.entry()?.0.len())
    }

    /// Length of the current value.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotStarted`] before the cursor is positioned.
    pub fn valsize(&self) -> CoreResult<usize> {
        Ok(self.entry()?.1.len())
    }

    /// Releases the position. Every later call fails with `NotInitialized`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotInitialized`] if already freed.
    pub fn free(&mut self) -> CoreResult<()> {
        self.ensure_initialized()?;
        self.current = None;
        self.state = CursorState::Freed;
        Ok(())
    }

    /// Iterates from the current position towards larger keys, starting
    /// with `first()` if the cursor was never positioned.
    pub fn forward(self) -> Forward<'t> {
        Forward { cursor: self }
    }

    /// Iterates from the current position towards smaller keys, starting
    /// with `last()` if the cursor was never positioned.
    pub fn backward(self) -> Backward<'t> {
        Backward { cursor: self }
    }

    fn ensure_initialized(&self) -> CoreResult<()> {
        if self.state == CursorState::Freed {
            return Err(CoreError::NotInitialized { what: "cursor" });
        }
        Ok(())
    }

    fn current_key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(key, _)| key.as_slice())
    }

    fn entry(&self) -> CoreResult<&Entry<'t>> {
        self.ensure_initialized()?;
        self.current.as_ref().ok_or(CoreError::NotStarted)
    }

    fn place(&mut self, entry: Entry<'t>) -> CoreResult<()> {
        if let Some(limit) = self.key_limit {
            if entry.0.len() > limit {
                return Err(CoreError::LimitExceeded {
                    limit,
                    len: entry.0.len(),
                });
            }
        }
        self.current = Some(entry);
        self.state = CursorState::Positioned;
        self.fresh = true;
        Ok(())
    }

    /// Yields the current entry once, then steps with `step`.
    fn advance(
        &mut self,
        start: fn(&mut Self) -> CoreResult<()>,
        step: fn(&mut Self) -> CoreResult<()>,
    ) -> Option<CoreResult<(Vec<u8>, &'t [u8])>> {
        if self.halted {
            return None;
        }
        let moved = if self.is_started() {
            if self.fresh {
                Ok(())
            } else {
                step(self)
            }
        } else {
            start(self)
        };
        match moved {
            Ok(()) => {
                self.fresh = false;
                self.current.clone().map(Ok)
            }
            Err(err) if err.is_end_of_sequence() => None,
            Err(err) => {
                self.halted = true;
                Some(Err(err))
            }
        }
    }
}

/// Forward iteration adapter returned by [`Cursor::forward`].
#[derive(Debug, Clone)]
pub struct Forward<'t> {
    cursor: Cursor<'t>,
}

impl<'t> Forward<'t> {
    /// Returns the underlying cursor at its current position.
    pub fn into_inner(self) -> Cursor<'t> {
        self.cursor
    }
}

impl<'t> Iterator for Forward<'t> {
    type Item = CoreResult<(Vec<u8>, &'t [u8])>;

    /// Yields the current entry if it has not been yielded yet, then moves
    /// forward.
    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance(Cursor::first, Cursor::next)
    }
}

/// Reverse iteration adapter returned by [`Cursor::backward`].
#[derive(Debug, Clone)]
pub struct Backward<'t> {
    cursor: Cursor<'t>,
}

impl<'t> Backward<'t> {
    /// Returns the underlying cursor at its current position.
    pub fn into_inner(self) -> Cursor<'t> {
        self.cursor
    }
}

impl<'t> Iterator for Backward<'t> {
    type Item = CoreResult<(Vec<u8>, &'t [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance(Cursor::last, Cursor::prev)
    }
}
