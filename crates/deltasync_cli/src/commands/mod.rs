//! CLI command implementations.

pub mod gc;
pub mod init;
pub mod schema;
pub mod sync;

use deltasync_core::{StoreConfig, SyncDatabase};
use deltasync_storage::SqliteBackend;
use std::path::Path;

/// Loads the store description and opens the database file.
pub fn open_store(
    db_path: &Path,
    config_path: &Path,
) -> Result<(SyncDatabase, SqliteBackend), Box<dyn std::error::Error>> {
    let store = StoreConfig::from_path(config_path)?;
    let db = store.build()?;
    let backend = SqliteBackend::open_with_create_dirs(db_path)?;
    Ok((db, backend))
}
