//! Fault injection for storage backends.
//!
//! [`FaultyBackend`] wraps any backend and fails a chosen statement or the
//! commit, so tests can check that an interrupted unit of work leaves the
//! store untouched.

use deltasync_storage::{
    ParamStyle, ResultSet, StorageBackend, StorageError, StorageResult, StorageTransaction, Value,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
struct FaultState {
    fail_at: AtomicUsize,
    statements: AtomicUsize,
    fail_commit: AtomicBool,
    injected: AtomicUsize,
}

impl FaultState {
    /// Counts one statement and reports whether it must fail.
    fn tick(&self) -> StorageResult<()> {
        let n = self.statements.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at.load(Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::backend(format!("injected failure at statement {n}")));
        }
        Ok(())
    }
}

/// A storage backend wrapper that fails on demand.
///
/// Statements are counted across transactions from the last
/// [`FaultyBackend::reset`]. `execute`, `execute_many` and `query` count as
/// one statement each.
#[derive(Debug)]
pub struct FaultyBackend<B> {
    inner: B,
    state: FaultState,
}

impl<B: StorageBackend> FaultyBackend<B> {
    /// Wraps a backend. No faults are armed.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            state: FaultState {
                fail_at: AtomicUsize::new(usize::MAX),
                statements: AtomicUsize::new(0),
                fail_commit: AtomicBool::new(false),
                injected: AtomicUsize::new(0),
            },
        }
    }

    /// Fails the `n`th statement (1-based) from now on.
    pub fn fail_statement(&self, n: usize) {
        self.state.statements.store(0, Ordering::SeqCst);
        self.state.fail_at.store(n, Ordering::SeqCst);
    }

    /// Sets whether commits fail.
    pub fn set_fail_commit(&self, fail: bool) {
        self.state.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Disarms all faults and clears the counters.
    pub fn reset(&self) {
        self.state.fail_at.store(usize::MAX, Ordering::SeqCst);
        self.state.statements.store(0, Ordering::SeqCst);
        self.state.fail_commit.store(false, Ordering::SeqCst);
        self.state.injected.store(0, Ordering::SeqCst);
    }

    /// Returns the number of statements seen since the last reset.
    pub fn statements(&self) -> usize {
        self.state.statements.load(Ordering::SeqCst)
    }

    /// Returns the number of failures injected since the last reset.
    pub fn injected(&self) -> usize {
        self.state.injected.load(Ordering::SeqCst)
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Returns the wrapped backend mutably.
    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }
}

impl<B: StorageBackend> StorageBackend for FaultyBackend<B> {
    type Transaction<'a>
        = FaultyTransaction<'a, B::Transaction<'a>>
    where
        Self: 'a;

    fn param_style(&self) -> ParamStyle {
        self.inner.param_style()
    }

    fn begin(&mut self) -> StorageResult<Self::Transaction<'_>> {
        let Self { inner, state } = self;
        let tx = inner.begin()?;
        Ok(FaultyTransaction {
            inner: tx,
            state: &*state,
        })
    }
}

/// Transaction handed out by [`FaultyBackend`].
#[derive(Debug)]
pub struct FaultyTransaction<'a, T> {
    inner: T,
    state: &'a FaultState,
}

impl<T: StorageTransaction> StorageTransaction for FaultyTransaction<'_, T> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StorageResult<usize> {
        self.state.tick()?;
        self.inner.execute(sql, params)
    }

    fn execute_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> StorageResult<usize> {
        self.state.tick()?;
        self.inner.execute_many(sql, param_sets)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StorageResult<ResultSet> {
        self.state.tick()?;
        self.inner.query(sql, params)
    }

    fn commit(self) -> StorageResult<()> {
        if self.state.fail_commit.load(Ordering::SeqCst) {
            self.state.injected.fetch_add(1, Ordering::SeqCst);
            // Dropping the inner transaction discards its writes
            return Err(StorageError::backend("injected commit failure"));
        }
        self.inner.commit()
    }

    fn rollback(self) -> StorageResult<()> {
        self.inner.rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deltasync_storage::SqliteBackend;

    fn backend() -> FaultyBackend<SqliteBackend> {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .connection()
            .execute_batch("CREATE TABLE t(x INTEGER)")
            .unwrap();
        FaultyBackend::new(backend)
    }

    fn count(backend: &FaultyBackend<SqliteBackend>) -> i64 {
        backend
            .inner()
            .connection()
            .query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn passes_through_when_disarmed() {
        let mut backend = backend();
        let mut tx = backend.begin().unwrap();
        tx.execute("INSERT INTO t VALUES(?)", &[Value::Integer(1)]).unwrap();
        tx.commit().unwrap();
        assert_eq!(count(&backend), 1);
        assert_eq!(backend.statements(), 1);
        assert_eq!(backend.injected(), 0);
    }

    #[test]
    fn fails_chosen_statement() {
        let mut backend = backend();
        backend.fail_statement(2);
        let mut tx = backend.begin().unwrap();
        tx.execute("INSERT INTO t VALUES(?)", &[Value::Integer(1)]).unwrap();
        assert!(tx.query("SELECT x FROM t", &[]).is_err());
        assert!(tx.query("SELECT x FROM t", &[]).is_ok());
        tx.rollback().unwrap();
        assert_eq!(count(&backend), 0);
        assert_eq!(backend.injected(), 1);
    }

    #[test]
    fn failed_commit_discards() {
        let mut backend = backend();
        backend.set_fail_commit(true);
        let mut tx = backend.begin().unwrap();
        tx.execute("INSERT INTO t VALUES(?)", &[Value::Integer(1)]).unwrap();
        assert!(tx.commit().is_err());
        assert_eq!(count(&backend), 0);

        backend.reset();
        assert_eq!(backend.statements(), 0);
    }
}
