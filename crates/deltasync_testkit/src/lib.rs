//! # deltasync Testkit
//!
//! Test utilities for deltasync.
//!
//! This crate provides:
//! - Canonical test stores (`item`, and the `thread`/`post` forum
//!   partitioned by `user`)
//! - A fault-injecting backend wrapper
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use deltasync_core::{SyncRequest, TableDelta};
//! use deltasync_testkit::prelude::*;
//!
//! let (mut store, _counter) = scenarios::counted_items();
//! let request = SyncRequest::initial()
//!     .with_table("item", TableDelta::new().modify(item(1, "Item 1")));
//! assert_eq!(store.sync(&request).timestamp, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fault;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fault::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fault::*;
pub use fixtures::*;
pub use generators::*;
