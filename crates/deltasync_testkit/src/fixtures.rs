//! Test fixtures and store helpers.
//!
//! Provides the canonical stores used across the test suites and a
//! [`TestStore`] that pairs a [`SyncDatabase`] with a SQLite backend.

use deltasync_core::{
    Column, CoreResult, Extras, GarbageReport, SyncConfig, SyncDatabase, SyncRequest,
    SyncResponse, TimestampSource,
};
use deltasync_storage::{row, Row, SqliteBackend, StorageBackend, StorageTransaction, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds a store with one table `item(id, name)` keyed by `id`.
pub fn item_database(source: impl TimestampSource + 'static) -> SyncDatabase {
    let db = SyncDatabase::with_source(SyncConfig::new(), source);
    db.register_table("item", ["id"], vec![Column::integer("id"), Column::string("name")])
        .expect("Failed to register item");
    db
}

/// Builds a forum store partitioned by an integer `user` column.
///
/// Tables: `thread(id, title)` and `post(id, thread, body)`.
pub fn forum_database(source: impl TimestampSource + 'static) -> SyncDatabase {
    let config = SyncConfig::new().with_extra_column(Column::integer("user"));
    let db = SyncDatabase::with_source(config, source);
    db.register_table(
        "thread",
        ["id"],
        vec![Column::integer("id"), Column::string("title")],
    )
    .expect("Failed to register thread");
    db.register_table(
        "post",
        ["id"],
        vec![
            Column::integer("id"),
            Column::integer("thread"),
            Column::string("body"),
        ],
    )
    .expect("Failed to register post");
    db
}

/// An `item` row.
pub fn item(id: i64, name: &str) -> Row {
    row! { "id" => id, "name" => name }
}

/// A primary key of a table keyed by `id`.
pub fn key(id: i64) -> Row {
    row! { "id" => id }
}

/// Partition values for a forum user.
pub fn user(id: i64) -> Extras {
    Extras::new().with("user", id)
}

/// A store with its tables created, backed by SQLite.
pub struct TestStore {
    /// The coordinator.
    pub db: SyncDatabase,
    /// The connection exchanges run against.
    pub backend: SqliteBackend,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates the tables of `db` in a fresh in-memory database.
    pub fn memory(db: SyncDatabase) -> Self {
        let mut backend =
            SqliteBackend::open_in_memory().expect("Failed to open in-memory database");
        db.create_tables(&mut backend)
            .expect("Failed to create tables");
        Self {
            db,
            backend,
            _temp_dir: None,
        }
    }

    /// Creates the tables of `db` in a database file in a temporary directory.
    pub fn file(db: SyncDatabase) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store.db");
        let mut backend = SqliteBackend::open(&path).expect("Failed to open database file");
        db.create_tables(&mut backend)
            .expect("Failed to create tables");
        Self {
            db,
            backend,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store.db"))
    }

    /// Opens another connection to a file-based store.
    pub fn connect(&self) -> SqliteBackend {
        let path = self.path().expect("In-memory stores cannot be shared");
        open(&path)
    }

    /// Runs an exchange with no partition values.
    pub fn sync(&mut self, request: &SyncRequest) -> SyncResponse {
        self.try_sync(request, &Extras::new())
            .expect("Synchronization failed")
    }

    /// Runs an exchange with partition values.
    pub fn sync_as(&mut self, request: &SyncRequest, extras: &Extras) -> SyncResponse {
        self.try_sync(request, extras)
            .expect("Synchronization failed")
    }

    /// Runs an exchange and returns its result.
    pub fn try_sync(&mut self, request: &SyncRequest, extras: &Extras) -> CoreResult<SyncResponse> {
        self.db.synchronize(&mut self.backend, request, extras)
    }

    /// Collects garbage.
    pub fn collect_garbage(&mut self, retention: i64) -> GarbageReport {
        self.db
            .collect_garbage(&mut self.backend, retention)
            .expect("Garbage collection failed")
    }

    /// Inserts a stored row directly, bypassing the sync protocol.
    ///
    /// `row` must carry every stored column, `timestamp` and extras included.
    pub fn insert_raw(&mut self, table: &str, row: &Row) {
        let columns: Vec<String> = row.keys().map(|c| format!("\"{c}\"")).collect();
        let marks = vec!["?"; row.len()].join(",");
        let sql = format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({marks})",
            columns.join(",")
        );
        let params: Vec<Value> = row.values().cloned().collect();

        let mut tx = self.backend.begin().expect("Failed to begin");
        tx.execute(&sql, &params).expect("Failed to insert row");
        tx.commit().expect("Failed to commit");
    }

    /// Returns every stored row of a table, stored columns included,
    /// in insertion order.
    pub fn dump(&mut self, table: &str) -> Vec<Row> {
        dump(&mut self.backend, table)
    }

    /// Returns the stored timestamps of a table ordered by `id`.
    pub fn timestamps(&mut self, table: &str) -> Vec<(i64, i64)> {
        let sql = format!("SELECT \"id\", \"timestamp\" FROM \"{table}\" ORDER BY \"id\"");
        let mut tx = self.backend.begin().expect("Failed to begin");
        let set = tx.query(&sql, &[]).expect("Failed to read table");
        tx.rollback().expect("Failed to roll back");
        set.rows
            .iter()
            .map(|r| {
                (
                    r[0].as_integer().expect("id is an integer"),
                    r[1].as_integer().expect("timestamp is an integer"),
                )
            })
            .collect()
    }
}

impl std::ops::Deref for TestStore {
    type Target = SyncDatabase;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Opens a connection to an existing database file.
pub fn open(path: &Path) -> SqliteBackend {
    SqliteBackend::open(path).expect("Failed to open database file")
}

/// Returns every stored row of a table in insertion order.
pub fn dump(backend: &mut SqliteBackend, table: &str) -> Vec<Row> {
    let sql = format!("SELECT * FROM \"{table}\" ORDER BY rowid");
    let mut tx = backend.begin().expect("Failed to begin");
    let set = tx.query(&sql, &[]).expect("Failed to read table");
    tx.rollback().expect("Failed to roll back");
    set.into_rows()
}

/// Scenario helpers.
pub mod scenarios {
    use super::*;
    use deltasync_core::SequenceCounter;
    use std::sync::Arc;

    /// An `item` store stamped by a counter whose first value is 1.
    ///
    /// Returns the counter so tests can inspect it.
    pub fn counted_items() -> (TestStore, Arc<SequenceCounter>) {
        let counter = Arc::new(SequenceCounter::new(0));
        let store = TestStore::memory(item_database(Arc::clone(&counter)));
        (store, counter)
    }

    /// A forum store stamped by a counter whose first value is 1.
    pub fn counted_forum() -> TestStore {
        TestStore::memory(forum_database(SequenceCounter::new(0)))
    }
}
