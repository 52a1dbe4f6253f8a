//! Garbage collection command implementation.

use std::path::Path;

/// Runs the gc command.
pub fn run(
    db_path: &Path,
    config_path: &Path,
    retention_secs: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (db, mut backend) = super::open_store(db_path, config_path)?;
    let retention = retention_secs.unwrap_or_else(|| db.config().retention_secs());

    let report = db.collect_garbage(&mut backend, retention)?;

    println!("Garbage collection at {} (retention {}s):", report.now, retention);
    for (table, purged) in &report.purged {
        println!("  {table:<20} {purged} tombstones purged");
    }
    println!("  Total: {}", report.total());
    Ok(())
}
