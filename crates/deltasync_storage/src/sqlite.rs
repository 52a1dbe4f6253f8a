//! SQLite storage backend.

use crate::backend::{StorageBackend, StorageTransaction};
use crate::error::StorageResult;
use crate::param::ParamStyle;
use crate::result::ResultSet;
use crate::value::Value;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// Default time a writer waits for a competing writer before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite-backed store.
///
/// Each backend owns one connection. Concurrent exchanges against the same
/// database file use one backend per thread.
///
/// # Isolation
///
/// Transactions begin `IMMEDIATE`: the write lock is taken up front and held
/// until commit or rollback, so exchanges on the same file are serialized
/// and never observe each other's half-applied state.
///
/// # Example
///
/// ```
/// use deltasync_storage::{SqliteBackend, StorageBackend, StorageTransaction, Value};
///
/// let mut backend = SqliteBackend::open_in_memory().unwrap();
/// backend.connection().execute_batch("CREATE TABLE t(x INTEGER)").unwrap();
///
/// let mut tx = backend.begin().unwrap();
/// tx.execute("INSERT INTO t VALUES(?)", &[Value::Integer(7)]).unwrap();
/// tx.commit().unwrap();
///
/// let mut tx = backend.begin().unwrap();
/// let set = tx.query("SELECT x FROM t", &[]).unwrap();
/// assert_eq!(set.scalar(), Some(&Value::Integer(7)));
/// ```
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Opens or creates a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens or creates a database file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the busy timeout cannot be set.
    pub fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Sets how long to wait for a competing writer.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite rejects the setting.
    pub fn with_busy_timeout(self, timeout: Duration) -> StorageResult<Self> {
        self.conn.busy_timeout(timeout)?;
        Ok(self)
    }

    /// Returns the underlying connection, for schema setup and inspection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the underlying connection mutably.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Consumes the backend and returns its connection.
    #[must_use]
    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

impl StorageBackend for SqliteBackend {
    type Transaction<'a> = SqliteTransaction<'a>;

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Qmark
    }

    fn begin(&mut self) -> StorageResult<SqliteTransaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SqliteTransaction { tx })
    }
}

/// An open SQLite transaction. Rolls back when dropped uncommitted.
#[derive(Debug)]
pub struct SqliteTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl StorageTransaction for SqliteTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StorageResult<usize> {
        let mut stmt = self.tx.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter()))?)
    }

    fn execute_many(&mut self, sql: &str, param_sets: &[Vec<Value>]) -> StorageResult<usize> {
        if param_sets.is_empty() {
            return Ok(0);
        }
        let mut stmt = self.tx.prepare_cached(sql)?;
        let mut affected = 0;
        for params in param_sets {
            affected += stmt.execute(params_from_iter(params.iter()))?;
        }
        Ok(affected)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StorageResult<ResultSet> {
        let mut stmt = self.tx.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(Value::from(row.get_ref(index)?));
            }
            out.push(values);
        }

        Ok(ResultSet::new(columns, out))
    }

    fn commit(self) -> StorageResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> StorageResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}
