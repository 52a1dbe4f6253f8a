//! Request and response payloads of a sync exchange.

use crate::error::{CoreError, CoreResult};
use crate::types::{Timestamp, EPOCH};
use deltasync_storage::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Changes for one table, in either direction.
///
/// In a request these are the client's outgoing changes. In a response they
/// are the rows the client is missing; `deleted` rows carry only their
/// primary-key columns.
///
/// Both lists are required on the wire, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDelta {
    /// Created or updated rows.
    pub modified: Vec<Row>,
    /// Deleted rows, primary-key columns only.
    pub deleted: Vec<Row>,
}

impl TableDelta {
    /// Creates an empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a created or updated row.
    #[must_use]
    pub fn modify(mut self, row: Row) -> Self {
        self.modified.push(row);
        self
    }

    /// Adds a deleted key.
    #[must_use]
    pub fn delete(mut self, key: Row) -> Self {
        self.deleted.push(key);
        self
    }

    /// Returns true if neither list has entries.
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// A client's half of an exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncRequest {
    /// The timestamp returned by the client's previous exchange, or 0.
    pub timestamp: Timestamp,
    /// Outgoing changes per table.
    pub table: BTreeMap<String, TableDelta>,
}

impl SyncRequest {
    /// Creates a request with no changes.
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            table: BTreeMap::new(),
        }
    }

    /// Creates a request for a client that never synchronized.
    pub fn initial() -> Self {
        Self::new(EPOCH)
    }

    /// Adds the changes for one table.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, delta: TableDelta) -> Self {
        self.table.insert(name.into(), delta);
        self
    }

    /// Parses a request from JSON.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRequest` if the text is not a request, including
    /// when a field is missing or a key is not part of the payload format.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        serde_json::from_str(text).map_err(|e| CoreError::malformed(e.to_string()))
    }
}

/// The store's half of an exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Timestamp to present in the next request.
    pub timestamp: Timestamp,
    /// Missing changes per table named in the request.
    pub table: BTreeMap<String, TableDelta>,
}

impl SyncResponse {
    /// Returns the delta for a table, if the request named it.
    pub fn delta(&self, name: &str) -> Option<&TableDelta> {
        self.table.get(name)
    }

    /// Serializes the response to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in JSON.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::InvalidOperation {
            message: format!("response not serializable: {e}"),
        })
    }
}
