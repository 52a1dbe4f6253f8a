//! Schema command implementation.

use deltasync_core::StoreConfig;
use std::path::Path;

/// Runs the schema command.
pub fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = StoreConfig::from_path(config_path)?.build()?;
    println!("{}", serde_json::to_string_pretty(&db.schema())?);
    Ok(())
}
