//! Property-based test generators using proptest.
//!
//! Provides strategies for client scripts against the `item` store and a
//! [`Replica`] that models a client's local copy.

use crate::fixtures::{item, key};
use deltasync_core::{SyncRequest, SyncResponse, TableDelta, Timestamp, EPOCH};
use deltasync_storage::Row;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// A change a client makes to its local `item` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemChange {
    /// Create or update a row.
    Upsert {
        /// Row id
        id: i64,
        /// New name
        name: String,
    },
    /// Delete a row.
    Delete {
        /// Row id
        id: i64,
    },
}

/// One exchange of a scripted client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedExchange {
    /// Index of the client running the exchange.
    pub client: usize,
    /// Changes the client sends.
    pub changes: Vec<ItemChange>,
}

impl ScriptedExchange {
    /// Returns the changes as an `item` delta.
    pub fn delta(&self) -> TableDelta {
        let mut delta = TableDelta::new();
        for change in &self.changes {
            match change {
                ItemChange::Upsert { id, name } => delta.modified.push(item(*id, name)),
                ItemChange::Delete { id } => delta.deleted.push(key(*id)),
            }
        }
        delta
    }
}

/// Strategy for generating item names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex")
}

/// Strategy for generating changes over ids `1..=max_id`.
pub fn item_change_strategy(max_id: i64) -> impl Strategy<Value = ItemChange> {
    prop_oneof![
        3 => (1..=max_id, name_strategy()).prop_map(|(id, name)| ItemChange::Upsert { id, name }),
        1 => (1..=max_id).prop_map(|id| ItemChange::Delete { id }),
    ]
}

/// Strategy for generating one exchange of one of `clients` clients.
pub fn exchange_strategy(clients: usize, max_id: i64) -> impl Strategy<Value = ScriptedExchange> {
    (
        0..clients,
        prop::collection::vec(item_change_strategy(max_id), 0..4),
    )
        .prop_map(|(client, changes)| ScriptedExchange { client, changes })
}

/// Strategy for generating a script of exchanges.
pub fn script_strategy(
    clients: usize,
    max_id: i64,
    max_exchanges: usize,
) -> impl Strategy<Value = Vec<ScriptedExchange>> {
    prop::collection::vec(exchange_strategy(clients, max_id), 1..max_exchanges)
}

/// A client's local copy of the `item` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replica {
    /// Timestamp returned by the last exchange.
    pub timestamp: Timestamp,
    /// Live rows by id.
    pub rows: BTreeMap<i64, Row>,
}

impl Replica {
    /// Creates a replica that never synchronized.
    pub fn new() -> Self {
        Self {
            timestamp: EPOCH,
            rows: BTreeMap::new(),
        }
    }

    /// Applies local changes, returning the request that reports them.
    pub fn change(&mut self, exchange: &ScriptedExchange) -> SyncRequest {
        let delta = exchange.delta();
        self.apply(&delta);
        SyncRequest::new(self.timestamp).with_table("item", delta)
    }

    /// Returns a request reporting no changes.
    pub fn pull(&self) -> SyncRequest {
        SyncRequest::new(self.timestamp).with_table("item", TableDelta::new())
    }

    /// Applies the store's answer.
    pub fn receive(&mut self, response: &SyncResponse) {
        self.timestamp = response.timestamp;
        if let Some(delta) = response.delta("item") {
            self.apply(delta);
        }
    }

    fn apply(&mut self, delta: &TableDelta) {
        for row in &delta.modified {
            if let Some(id) = row.get("id").and_then(|v| v.as_integer()) {
                self.rows.insert(id, row.clone());
            }
        }
        for row in &delta.deleted {
            if let Some(id) = row.get("id").and_then(|v| v.as_integer()) {
                self.rows.remove(&id);
            }
        }
    }
}
