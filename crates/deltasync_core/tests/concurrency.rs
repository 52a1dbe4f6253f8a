//! Concurrent exchanges against one database file.

use deltasync_core::{
    Extras, FixedClock, Monotonic, SequenceCounter, SyncDatabase, SyncRequest, TableDelta,
};
use deltasync_storage::SqliteBackend;
use deltasync_testkit::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

const CLIENTS: i64 = 4;
const ROUNDS: i64 = 10;

fn shared_store() -> (TempDir, Arc<SyncDatabase>) {
    let dir = TempDir::new().unwrap();
    let db = item_database(Monotonic::new(SequenceCounter::new(0)));
    let mut backend = SqliteBackend::open(&dir.path().join("store.db")).unwrap();
    db.create_tables(&mut backend).unwrap();
    (dir, Arc::new(db))
}

#[test]
fn concurrent_clients_converge() {
    let (dir, db) = shared_store();
    let path = dir.path().join("store.db");
    let issued = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..CLIENTS)
        .map(|client| {
            let db = Arc::clone(&db);
            let path = path.clone();
            let issued = Arc::clone(&issued);
            thread::spawn(move || {
                let mut backend = open(&path);
                let mut replica = Replica::new();
                for round in 0..ROUNDS {
                    let id = client * 100 + round;
                    let exchange = ScriptedExchange {
                        client: client as usize,
                        changes: vec![ItemChange::Upsert {
                            id,
                            name: format!("client {client} round {round}"),
                        }],
                    };
                    let request = replica.change(&exchange);
                    let response = db
                        .synchronize(&mut backend, &request, &Default::default())
                        .unwrap();
                    issued.lock().unwrap().push(response.timestamp);
                    replica.receive(&response);
                }
                (backend, replica)
            })
        })
        .collect();

    let mut clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let issued = issued.lock().unwrap();
    let unique: BTreeSet<_> = issued.iter().copied().collect();
    assert_eq!(unique.len(), issued.len(), "timestamps repeated");

    let expected: BTreeSet<i64> = (0..CLIENTS)
        .flat_map(|c| (0..ROUNDS).map(move |r| c * 100 + r))
        .collect();
    for (backend, replica) in &mut clients {
        let response = db
            .synchronize(backend, &replica.pull(), &Default::default())
            .unwrap();
        replica.receive(&response);
        let ids: BTreeSet<i64> = replica.rows.keys().copied().collect();
        assert_eq!(ids, expected);
    }
}

#[test]
fn concurrent_deletes_reach_every_client() {
    let (dir, db) = shared_store();
    let path = dir.path().join("store.db");

    {
        let mut backend = open(&path);
        let mut delta = TableDelta::new();
        for id in 0..CLIENTS {
            delta = delta.modify(item(id, "shared"));
        }
        db.synchronize(
            &mut backend,
            &SyncRequest::initial().with_table("item", delta),
            &Default::default(),
        )
        .unwrap();
    }

    let handles: Vec<_> = (0..CLIENTS)
        .map(|client| {
            let db = Arc::clone(&db);
            let path = path.clone();
            thread::spawn(move || {
                let mut backend = open(&path);
                let mut replica = Replica::new();
                let response = db
                    .synchronize(&mut backend, &replica.pull(), &Default::default())
                    .unwrap();
                replica.receive(&response);
                let exchange = ScriptedExchange {
                    client: client as usize,
                    changes: vec![ItemChange::Delete { id: client }],
                };
                let response = db
                    .synchronize(&mut backend, &replica.change(&exchange), &Default::default())
                    .unwrap();
                replica.receive(&response);
                (backend, replica)
            })
        })
        .collect();

    for handle in handles {
        let (mut backend, mut replica) = handle.join().unwrap();
        let response = db
            .synchronize(&mut backend, &replica.pull(), &Default::default())
            .unwrap();
        replica.receive(&response);
        assert!(replica.rows.is_empty(), "left over: {:?}", replica.rows);
    }
}

#[test]
fn separate_processes_never_share_a_timestamp() {
    // Two coordinators over one file, each with a clock stuck in the same second.
    let store = TestStore::file(item_database(Monotonic::new(FixedClock(10))));
    let a = item_database(Monotonic::new(FixedClock(10)));
    let b = item_database(Monotonic::new(FixedClock(10)));
    let mut a_backend = store.connect();
    let mut b_backend = store.connect();

    let first = a
        .synchronize(
            &mut a_backend,
            &SyncRequest::initial().with_table("item", TableDelta::new().modify(item(1, "a"))),
            &Extras::new(),
        )
        .unwrap();
    assert_eq!(first.timestamp, 10);

    let second = b
        .synchronize(
            &mut b_backend,
            &SyncRequest::initial().with_table("item", TableDelta::new().modify(item(2, "b"))),
            &Extras::new(),
        )
        .unwrap();
    assert_eq!(second.timestamp, 11);
    assert_eq!(second.table["item"], TableDelta::new().modify(item(1, "a")));

    let third = a
        .synchronize(
            &mut a_backend,
            &SyncRequest::new(first.timestamp).with_table("item", TableDelta::new()),
            &Extras::new(),
        )
        .unwrap();
    assert_eq!(third.timestamp, 12);
    assert_eq!(third.table["item"], TableDelta::new().modify(item(2, "b")));
}
