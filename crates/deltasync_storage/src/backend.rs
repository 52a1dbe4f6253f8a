//! Storage backend trait definitions.

use crate::error::StorageResult;
use crate::param::ParamStyle;
use crate::result::ResultSet;
use crate::value::Value;

/// A relational store that statements can be run against.
///
/// The sync engine never talks to a database driver directly. It renders
/// parameterized statements in the backend's [`ParamStyle`] and runs them
/// inside a [`StorageTransaction`].
///
/// # Invariants
///
/// - `begin` returns a transaction whose writes are invisible to others
///   until `commit`
/// - a transaction dropped without `commit` leaves the store unchanged
/// - implementations must serialize writers touching the same rows for at
///   least the lifetime of a transaction (read-committed or stronger)
///
/// # Implementors
///
/// - [`super::SqliteBackend`] - SQLite through rusqlite
pub trait StorageBackend {
    /// The transaction handle type.
    type Transaction<'a>: StorageTransaction
    where
        Self: 'a;

    /// Returns the placeholder convention statements must use.
    fn param_style(&self) -> ParamStyle;

    /// Opens a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started, for example
    /// because the store is locked by another writer past its timeout.
    fn begin(&mut self) -> StorageResult<Self::Transaction<'_>>;
}

/// An open unit of work against a [`StorageBackend`].
pub trait StorageTransaction {
    /// Executes one statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails to prepare or execute.
    fn execute(&mut self, sql: &str, params: &[Value]) -> StorageResult<usize>;

    /// Executes one statement once per parameter set.
    ///
    /// Returns the total number of affected rows. Stops at the first failing
    /// set; the caller is expected to roll back.
    ///
    /// # Errors
    ///
    /// Returns an error if any execution fails.
    fn execute_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> StorageResult<usize> {
        let mut affected = 0;
        for params in param_sets {
            affected += self.execute(sql, params)?;
        }
        Ok(affected)
    }

    /// Runs a query and returns its rows together with the column names.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails to prepare or execute.
    fn query(&mut self, sql: &str, params: &[Value]) -> StorageResult<ResultSet>;

    /// Makes all writes of this transaction durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the store is then unchanged.
    fn commit(self) -> StorageResult<()>;

    /// Discards all writes of this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback command itself fails.
    fn rollback(self) -> StorageResult<()>;
}
