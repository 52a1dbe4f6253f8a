//! # deltasync Storage
//!
//! Relational storage boundary for deltasync.
//!
//! The sync engine needs very little from a database: parameterized
//! statement execution (single and batched), query results with their
//! column names, and transactions with commit and rollback. This crate
//! defines that boundary and ships a SQLite implementation.
//!
//! ## Design Principles
//!
//! - Statement text carries identifiers only; values are always bound
//! - Backends declare their placeholder convention via [`ParamStyle`]
//! - Dropping an uncommitted transaction discards its writes
//!
//! ## Available Backends
//!
//! - [`SqliteBackend`] - SQLite through rusqlite, file or in-memory
//!
//! ## Example
//!
//! ```rust
//! use deltasync_storage::{row, SqliteBackend, StorageBackend, StorageTransaction, Value};
//!
//! let mut backend = SqliteBackend::open_in_memory().unwrap();
//! backend
//!     .connection()
//!     .execute_batch("CREATE TABLE item(id INTEGER, name TEXT)")
//!     .unwrap();
//!
//! let mut tx = backend.begin().unwrap();
//! tx.execute("INSERT INTO item VALUES(?, ?)", &[Value::Integer(1), Value::from("a")])
//!     .unwrap();
//! let rows = tx.query("SELECT id, name FROM item", &[]).unwrap().into_rows();
//! assert_eq!(rows, vec![row! { "id" => 1, "name" => "a" }]);
//! tx.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod param;
mod result;
mod sqlite;
mod value;

pub use backend::{StorageBackend, StorageTransaction};
pub use error::{StorageError, StorageResult};
pub use param::{ParamStyle, Placeholders};
pub use result::ResultSet;
pub use sqlite::{SqliteBackend, SqliteTransaction, DEFAULT_BUSY_TIMEOUT};
pub use value::{Row, Value};
