//! Init command implementation.

use std::path::Path;

/// Runs the init command.
pub fn run(db_path: &Path, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (db, mut backend) = super::open_store(db_path, config_path)?;
    db.create_tables(&mut backend)?;

    println!("Initialized {:?}", db_path);
    for name in db.table_names() {
        println!("  {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn init_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("store.json");
        fs::write(
            &config,
            r#"{"tables": [{"name": "item", "primary_key": ["id"],
                "schema": [{"name": "id", "type": "integer"}, {"name": "name", "type": "string"}]}]}"#,
        )
        .unwrap();
        let db = dir.path().join("data").join("store.db");

        run(&db, &config).unwrap();
        run(&db, &config).unwrap();
        assert!(db.exists());
    }
}
