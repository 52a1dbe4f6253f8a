//! Sync command implementation.

use deltasync_core::{Extras, SyncRequest};
use deltasync_storage::Value;
use std::io::Read;
use std::path::Path;

/// Parses a `column=value` partition argument.
///
/// The value is read as a JSON scalar when it is one (`user=7`,
/// `user="7"`), and as text otherwise.
pub fn parse_extra(arg: &str) -> Result<(String, Value), String> {
    let (column, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got {arg:?}"))?;
    if column.is_empty() {
        return Err(format!("empty column name in {arg:?}"));
    }
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Blob(_)) | Err(_) => Value::Text(raw.to_string()),
        Ok(value) => value,
    };
    Ok((column.to_string(), value))
}

/// Runs the sync command.
pub fn run(
    db_path: &Path,
    config_path: &Path,
    request_path: Option<&Path>,
    extra_args: &[String],
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut extras = Extras::new();
    for arg in extra_args {
        let (column, value) = parse_extra(arg)?;
        extras.insert(column, value);
    }

    let text = match request_path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let request = SyncRequest::from_json(&text)?;

    let (db, mut backend) = super::open_store(db_path, config_path)?;
    let response = db.synchronize(&mut backend, &request, &extras)?;

    let out = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{out}");
    Ok(())
}
