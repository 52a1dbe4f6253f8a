//! Integration tests for atomicity of exchanges and collections.

use deltasync_core::{
    CoreError, Extras, FixedClock, SequenceCounter, SyncDatabase, SyncRequest, TableDelta,
};
use deltasync_storage::{row, SqliteBackend};
use deltasync_testkit::prelude::*;

fn faulty(db: &SyncDatabase) -> FaultyBackend<SqliteBackend> {
    let mut backend = FaultyBackend::new(SqliteBackend::open_in_memory().unwrap());
    db.create_tables(&mut backend).unwrap();
    backend.reset();
    backend
}

fn seed(db: &SyncDatabase, backend: &mut FaultyBackend<SqliteBackend>) {
    let request = SyncRequest::initial().with_table(
        "item",
        TableDelta::new().modify(item(1, "one")).modify(item(2, "two")),
    );
    db.synchronize(backend, &request, &Extras::new()).unwrap();
}

#[test]
fn failed_statement_leaves_store_untouched() {
    let db = item_database(SequenceCounter::new(0));
    let mut backend = faulty(&db);
    seed(&db, &mut backend);
    let before = dump(backend.inner_mut(), "item");

    let request = SyncRequest::new(1).with_table(
        "item",
        TableDelta::new().modify(item(3, "three")).delete(key(1)),
    );
    // high-water read, upsert, mark-deleted, select-changed, select-deleted-keys
    for statement in 1..=5 {
        backend.fail_statement(statement);
        let err = db
            .synchronize(&mut backend, &request, &Extras::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert!(!err.is_client_error());
        assert_eq!(dump(backend.inner_mut(), "item"), before);
    }
    assert_eq!(backend.injected(), 5);
}

#[test]
fn failed_commit_leaves_store_untouched() {
    let db = item_database(SequenceCounter::new(0));
    let mut backend = faulty(&db);
    seed(&db, &mut backend);
    let before = dump(backend.inner_mut(), "item");

    backend.set_fail_commit(true);
    let request = SyncRequest::new(1).with_table("item", TableDelta::new().delete(key(2)));
    assert!(db.synchronize(&mut backend, &request, &Extras::new()).is_err());
    assert_eq!(dump(backend.inner_mut(), "item"), before);
}

#[test]
fn retry_after_failure_succeeds() {
    let db = item_database(SequenceCounter::new(0));
    let mut backend = faulty(&db);
    seed(&db, &mut backend);

    let request = SyncRequest::new(1).with_table("item", TableDelta::new().modify(item(3, "three")));
    backend.fail_statement(2);
    assert!(db.synchronize(&mut backend, &request, &Extras::new()).is_err());

    backend.reset();
    let response = db.synchronize(&mut backend, &request, &Extras::new()).unwrap();
    assert_eq!(response.table["item"], TableDelta::new());
    assert_eq!(dump(backend.inner_mut(), "item").len(), 3);
}

#[test]
fn failure_in_second_table_undoes_first() {
    let db = forum_database(SequenceCounter::new(0));
    let mut backend = faulty(&db);

    // two high-water reads, then tables in name order: post, then thread
    let request = SyncRequest::initial()
        .with_table(
            "post",
            TableDelta::new().modify(row! { "id" => 1, "thread" => 1, "body" => "b" }),
        )
        .with_table("thread", TableDelta::new().modify(row! { "id" => 1, "title" => "t" }));
    backend.fail_statement(7);
    assert!(db.synchronize(&mut backend, &request, &user(1)).is_err());
    assert!(dump(backend.inner_mut(), "post").is_empty());
    assert!(dump(backend.inner_mut(), "thread").is_empty());
}

#[test]
fn failed_collection_keeps_tombstones() {
    let db = forum_database(FixedClock(10));
    let mut store_backend = faulty(&db);
    store_backend
        .inner()
        .connection()
        .execute_batch(
            "INSERT INTO post VALUES (1, 1, 'b', -2, 1);
             INSERT INTO thread VALUES (1, 't', -2, 1);",
        )
        .unwrap();

    // two high-water reads, purge of post succeeds, purge of thread fails
    store_backend.fail_statement(4);
    assert!(db.collect_garbage(&mut store_backend, 0).is_err());
    assert_eq!(dump(store_backend.inner_mut(), "post").len(), 1);
    assert_eq!(dump(store_backend.inner_mut(), "thread").len(), 1);

    store_backend.reset();
    let report = db.collect_garbage(&mut store_backend, 0).unwrap();
    assert_eq!(report.total(), 2);
}

#[test]
fn failed_table_creation_creates_nothing() {
    let db = forum_database(SequenceCounter::new(0));
    let mut backend = FaultyBackend::new(SqliteBackend::open_in_memory().unwrap());

    // post table, post index, then thread table fails
    backend.fail_statement(3);
    let err = db.create_tables(&mut backend).unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));
    let tables: i64 = backend
        .inner()
        .connection()
        .query_row("SELECT COUNT(*) FROM sqlite_master", [], |r| r.get(0))
        .unwrap();
    assert_eq!(tables, 0);

    backend.reset();
    db.create_tables(&mut backend).unwrap();
}

#[test]
fn failed_clock_recovery_reports_the_read_error() {
    let db = forum_database(SequenceCounter::new(0));
    let mut backend = faulty(&db);
    backend.fail_statement(2);
    assert!(matches!(
        db.recover_clock(&mut backend),
        Err(CoreError::Storage(_))
    ));
    backend.reset();
    assert_eq!(db.recover_clock(&mut backend).unwrap(), 0);
}
