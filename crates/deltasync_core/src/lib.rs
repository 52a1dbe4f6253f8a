//! # deltasync Core
//!
//! Delta synchronization for offline-first clients sharing one relational
//! store.
//!
//! Every row carries a signed `timestamp`. A positive value is the time of
//! the row's last write; a negative value marks a tombstone deleted at
//! `-timestamp`. A client presents the timestamp it received last time,
//! sends its own changes, and gets back exactly the rows that changed in
//! between, excluding the ones it just wrote.
//!
//! ## Components
//!
//! - [`clock`] - timestamp sources, including the [`Monotonic`] guard
//! - [`Table`] - statements and operations for one table
//! - [`SyncDatabase`] - the coordinator running exchanges and garbage
//!   collection in single transactions
//! - [`StoreConfig`] - JSON store description
//!
//! ## Tombstone retention
//!
//! [`SyncDatabase::collect_garbage`] removes tombstones older than a
//! retention window. A client that stays offline longer than that window
//! never learns about the purged deletions, so the window must exceed the
//! longest tolerated offline period.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
mod config;
mod database;
mod error;
mod message;
pub mod schema;
mod table;
mod types;

pub use clock::{FixedClock, Monotonic, SequenceCounter, SystemClock, TimestampSource};
pub use config::{StoreConfig, SyncConfig, TableConfig, DEFAULT_RETENTION};
pub use database::{GarbageReport, SyncDatabase};
pub use error::{CoreError, CoreResult};
pub use message::{SyncRequest, SyncResponse, TableDelta};
pub use table::{is_identifier, Statements, Table};
pub use types::{Column, ColumnType, Extras, Timestamp, EPOCH, TIMESTAMP_COLUMN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
