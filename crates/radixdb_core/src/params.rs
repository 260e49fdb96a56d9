//! Database and transaction parameters.
//!
//! [`Params`] is a mutable bag of option values drawn from the closed
//! [`Param`] enumeration. Databases and transactions never hold on to a
//! `Params`: they copy its values into a [`ParamValues`] snapshot when they
//! are created, so later changes (or freeing the bag) do not affect them.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::fmt;

/// Recognized parameter identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Param {
    /// Non-zero: transactions are started on construction.
    AutoBegin = 1,
    /// Non-zero (default): the transaction node arena grows on demand.
    /// Zero: the arena is reserved up front from `TransactionMemoryLimit`.
    DynamicAllocation = 2,
    /// Cap in bytes on a transaction's buffered mutations.
    TransactionMemoryLimit = 3,
    /// Longest key (in bytes) a cursor may be positioned on.
    CursorKeyLimit = 4,
    /// Non-zero (default): commits sync the backend, not just flush it.
    SyncOnCommit = 5,
}

impl Param {
    /// All recognized parameters, in identifier order.
    pub const ALL: [Param; 5] = [
        Param::AutoBegin,
        Param::DynamicAllocation,
        Param::TransactionMemoryLimit,
        Param::CursorKeyLimit,
        Param::SyncOnCommit,
    ];

    /// Resolves a numeric identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for unknown identifiers.
    pub fn from_id(id: u32) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|param| param.id() == id)
            .ok_or_else(|| CoreError::validation(format!("unknown parameter id {id}")))
    }

    /// Returns the numeric identifier.
    #[must_use]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Whether the parameter is a byte limit (must be positive).
    const fn is_limit(self) -> bool {
        matches!(self, Self::TransactionMemoryLimit | Self::CursorKeyLimit)
    }
}

impl TryFrom<u32> for Param {
    type Error = CoreError;

    fn try_from(id: u32) -> CoreResult<Self> {
        Self::from_id(id)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AutoBegin => "auto_begin",
            Self::DynamicAllocation => "dynamic_allocation",
            Self::TransactionMemoryLimit => "transaction_memory_limit",
            Self::CursorKeyLimit => "cursor_key_limit",
            Self::SyncOnCommit => "sync_on_commit",
        };
        f.write_str(name)
    }
}

/// A mutable, freeable set of parameter values.
///
/// # Example
///
/// ```rust
/// use radixdb_core::{Param, Params};
///
/// let mut params = Params::new();
/// params.set(Param::AutoBegin, 1).unwrap();
/// assert_eq!(params.get(Param::AutoBegin).unwrap(), Some(1));
/// assert_eq!(params.get(Param::CursorKeyLimit).unwrap(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Option<BTreeMap<Param, i64>>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: Some(BTreeMap::new()),
        }
    }

    /// Creates a parameter set from `(param, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if any value is rejected by [`Params::set`].
    pub fn from_values<I>(values: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (Param, i64)>,
    {
        let mut params = Self::new();
        for (param, value) in values {
            params.set(param, value)?;
        }
        Ok(params)
    }

    /// Returns `false` once the set has been freed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.values.is_some()
    }

    /// Sets a parameter value.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotInitialized`] if the set was freed
    /// - [`CoreError::Validation`] if a limit is not positive
    pub fn set(&mut self, param: Param, value: i64) -> CoreResult<()> {
        let values = self.values_mut()?;
        if param.is_limit() && value <= 0 {
            return Err(CoreError::validation(format!(
                "{param} must be positive, got {value}"
            )));
        }
        values.insert(param, value);
        Ok(())
    }

    /// Sets a parameter by numeric identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for unknown identifiers, plus the
    /// errors of [`Params::set`].
    pub fn set_raw(&mut self, id: u32, value: i64) -> CoreResult<()> {
        self.set(Param::from_id(id)?, value)
    }

    /// Returns the value set for `param`, or `None` if it was never set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] if the set was freed.
    pub fn get(&self, param: Param) -> CoreResult<Option<i64>> {
        Ok(self.values_ref()?.get(&param).copied())
    }

    /// Returns a copy of every value that has been set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] if the set was freed.
    pub fn get_values(&self) -> CoreResult<BTreeMap<Param, i64>> {
        Ok(self.values_ref()?.clone())
    }

    /// Takes an immutable snapshot of the current values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] if the set was freed.
    pub fn snapshot(&self) -> CoreResult<ParamValues> {
        Ok(ParamValues {
            values: self.values_ref()?.clone(),
        })
    }

    /// Releases the set. Every later call fails with `NotInitialized`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotInitialized`] if the set was already freed.
    pub fn free(&mut self) -> CoreResult<()> {
        self.values
            .take()
            .map(|_| ())
            .ok_or(CoreError::NotInitialized { what: "params" })
    }

    fn values_ref(&self) -> CoreResult<&BTreeMap<Param, i64>> {
        self.values
            .as_ref()
            .ok_or(CoreError::NotInitialized { what: "params" })
    }

    fn values_mut(&mut self) -> CoreResult<&mut BTreeMap<Param, i64>> {
        self.values
            .as_mut()
            .ok_or(CoreError::NotInitialized { what: "params" })
    }
}

/// An immutable snapshot of parameter values with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamValues {
    values: BTreeMap<Param, i64>,
}

impl ParamValues {
    /// Returns the raw value of `param`, if set.
    #[must_use]
    pub fn get(&self, param: Param) -> Option<i64> {
        self.values.get(&param).copied()
    }

    /// Returns a snapshot where every value set in `overrides` replaces ours.
    #[must_use]
    pub fn merged_with(&self, overrides: &ParamValues) -> ParamValues {
        let mut values = self.values.clone();
        values.extend(overrides.values.iter().map(|(k, v)| (*k, *v)));
        ParamValues { values }
    }

    /// Whether transactions begin on construction. Default: `false`.
    #[must_use]
    pub fn auto_begin(&self) -> bool {
        self.flag(Param::AutoBegin, false)
    }

    /// Whether the transaction arena grows on demand. Default: `true`.
    #[must_use]
    pub fn dynamic_allocation(&self) -> bool {
        self.flag(Param::DynamicAllocation, true)
    }

    /// Transaction buffer limit in bytes. Default: unlimited.
    #[must_use]
    pub fn memory_limit(&self) -> Option<usize> {
        self.limit(Param::TransactionMemoryLimit)
    }

    /// Longest key a cursor may be positioned on. Default: unlimited.
    #[must_use]
    pub fn cursor_key_limit(&self) -> Option<usize> {
        self.limit(Param::CursorKeyLimit)
    }

    /// Whether commits sync the backend. Default: `true`.
    #[must_use]
    pub fn sync_on_commit(&self) -> bool {
        self.flag(Param::SyncOnCommit, true)
    }

    fn flag(&self, param: Param, default: bool) -> bool {
        self.get(param).map_or(default, |v| v != 0)
    }

    fn limit(&self, param: Param) -> Option<usize> {
        self.get(param).and_then(|v| usize::try_from(v).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_params_are_initialized_and_empty() {
        let params = Params::new();
        assert!(params.is_initialized());
        assert!(params.get_values().unwrap().is_empty());
    }

    #[test]
    fn set_then_get() {
        let mut params = Params::new();
        params.set(Param::AutoBegin, 1).unwrap();
        assert_eq!(params.get(Param::AutoBegin).unwrap(), Some(1));
    }

    #[test]
    fn missing_value_is_none_not_error() {
        let mut params = Params::new();
        params.set(Param::DynamicAllocation, 1).unwrap();
        assert_eq!(params.get(Param::TransactionMemoryLimit).unwrap(), None);
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let mut params = Params::new();
        let result = params.set_raw(9999, 1);
        assert!(matches!(result, Err(CoreError::Validation { .. })));
        assert!(Param::try_from(0).is_err());
        assert_eq!(Param::try_from(1).unwrap(), Param::AutoBegin);
    }

    #[test]
    fn limits_must_be_positive() {
        let mut params = Params::new();
        assert!(params.set(Param::TransactionMemoryLimit, 0).is_err());
        assert!(params.set(Param::CursorKeyLimit, -4).is_err());
        assert!(params.set(Param::TransactionMemoryLimit, 4096).is_ok());
    }

    #[test]
    fn get_values_returns_everything_set() {
        let params =
            Params::from_values([(Param::DynamicAllocation, 1), (Param::AutoBegin, 1)]).unwrap();

        let expected: BTreeMap<Param, i64> =
            [(Param::DynamicAllocation, 1), (Param::AutoBegin, 1)]
                .into_iter()
                .collect();
        assert_eq!(params.get_values().unwrap(), expected);
    }

    #[test]
    fn freed_params_reject_every_call() {
        let mut params = Params::new();
        params.free().unwrap();

        assert!(!params.is_initialized());
        assert!(matches!(
            params.get(Param::AutoBegin),
            Err(CoreError::NotInitialized { .. })
        ));
        assert!(params.set(Param::AutoBegin, 1).is_err());
        assert!(matches!(
            params.set(Param::TransactionMemoryLimit, 0),
            Err(CoreError::NotInitialized { .. })
        ));
        assert!(params.snapshot().is_err());
        assert!(matches!(
            params.free(),
            Err(CoreError::NotInitialized { .. })
        ));
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let mut params = Params::from_values([(Param::AutoBegin, 1)]).unwrap();
        let snapshot = params.snapshot().unwrap();

        params.set(Param::AutoBegin, 0).unwrap();
        params.free().unwrap();

        assert!(snapshot.auto_begin());
    }

    #[test]
    fn defaults_without_values() {
        let values = ParamValues::default();
        assert!(!values.auto_begin());
        assert!(values.dynamic_allocation());
        assert!(values.sync_on_commit());
        assert_eq!(values.memory_limit(), None);
        assert_eq!(values.cursor_key_limit(), None);
    }

    #[test]
    fn overrides_replace_option_by_option() {
        let db = Params::from_values([(Param::AutoBegin, 1), (Param::CursorKeyLimit, 64)])
            .unwrap()
            .snapshot()
            .unwrap();
        let txn = Params::from_values([(Param::AutoBegin, 0)])
            .unwrap()
            .snapshot()
            .unwrap();

        let merged = db.merged_with(&txn);
        assert!(!merged.auto_begin());
        assert_eq!(merged.cursor_key_limit(), Some(64));
    }
}
