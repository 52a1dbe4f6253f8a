//! Store configuration.

use crate::clock::TimestampSource;
use crate::database::SyncDatabase;
use crate::error::{CoreError, CoreResult};
use crate::types::Column;
use deltasync_storage::ParamStyle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default tombstone retention: 30 days.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Configuration shared by every table of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Partition columns added to every table.
    pub extra_columns: Vec<Column>,
    /// Placeholder convention of the backend the store runs against.
    pub param_style: ParamStyle,
    /// How long tombstones are kept when no retention is given explicitly.
    pub retention: Duration,
}

impl SyncConfig {
    /// Creates a configuration with no extra columns.
    pub fn new() -> Self {
        Self {
            extra_columns: Vec::new(),
            param_style: ParamStyle::Qmark,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Adds a partition column.
    pub fn with_extra_column(mut self, column: Column) -> Self {
        self.extra_columns.push(column);
        self
    }

    /// Sets the placeholder convention.
    pub fn with_param_style(mut self, style: ParamStyle) -> Self {
        self.param_style = style;
        self
    }

    /// Sets the default tombstone retention.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Returns the retention in timestamp units (seconds).
    pub fn retention_secs(&self) -> i64 {
        i64::try_from(self.retention.as_secs()).unwrap_or(i64::MAX)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_retention_secs() -> u64 {
    DEFAULT_RETENTION.as_secs()
}

/// One table in a [`StoreConfig`] file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Table name.
    pub name: String,
    /// Primary-key column names.
    pub primary_key: Vec<String>,
    /// Logical schema, in column order.
    pub schema: Vec<Column>,
}

/// A complete store description, as read from JSON.
///
/// ```json
/// {
///   "extra_columns": [{ "name": "user", "type": "integer" }],
///   "retention_secs": 604800,
///   "tables": [
///     { "name": "item", "primary_key": ["id"],
///       "schema": [{ "name": "id", "type": "integer" }, { "name": "name", "type": "string" }] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Partition columns.
    #[serde(default)]
    pub extra_columns: Vec<Column>,
    /// Placeholder convention.
    #[serde(default)]
    pub param_style: ParamStyle,
    /// Default tombstone retention in seconds.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Tables to register.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

impl StoreConfig {
    /// Parses a store description.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the text is not a valid description.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        serde_json::from_str(text).map_err(|e| CoreError::Config {
            message: e.to_string(),
        })
    }

    /// Reads a store description from a file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Config` if it does not parse.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Returns the store-wide part of the description.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            extra_columns: self.extra_columns.clone(),
            param_style: self.param_style,
            retention: Duration::from_secs(self.retention_secs),
        }
    }

    /// Builds a database with every table registered, using the default
    /// timestamp source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTable` for the first table that cannot be registered.
    pub fn build(&self) -> CoreResult<SyncDatabase> {
        self.register_all(SyncDatabase::new(self.sync_config()))
    }

    /// Like [`StoreConfig::build`] with an explicit timestamp source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTable` for the first table that cannot be registered.
    pub fn build_with_source<S>(&self, source: S) -> CoreResult<SyncDatabase>
    where
        S: TimestampSource + 'static,
    {
        self.register_all(SyncDatabase::with_source(self.sync_config(), source))
    }

    fn register_all(&self, db: SyncDatabase) -> CoreResult<SyncDatabase> {
        for table in &self.tables {
            db.register_table(
                table.name.clone(),
                table.primary_key.iter().cloned(),
                table.schema.clone(),
            )?;
        }
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SequenceCounter;

    const STORE: &str = r#"{
        "extra_columns": [{ "name": "user", "type": "integer" }],
        "retention_secs": 600,
        "tables": [
            { "name": "thread", "primary_key": ["id"],
              "schema": [{ "name": "id", "type": "integer" }, { "name": "title", "type": "string" }] },
            { "name": "post", "primary_key": ["id"],
              "schema": [{ "name": "id", "type": "integer" }, { "name": "thread", "type": "integer" },
                         { "name": "body", "type": "string" }] }
        ]
    }"#;

    #[test]
    fn default_config() {
        let config = SyncConfig::default();
        assert!(config.extra_columns.is_empty());
        assert_eq!(config.param_style, ParamStyle::Qmark);
        assert_eq!(config.retention, DEFAULT_RETENTION);
    }

    #[test]
    fn config_builder() {
        let config = SyncConfig::new()
            .with_extra_column(Column::integer("user"))
            .with_param_style(ParamStyle::Dollar)
            .with_retention(Duration::from_secs(60));
        assert_eq!(config.extra_columns, vec![Column::integer("user")]);
        assert_eq!(config.param_style, ParamStyle::Dollar);
        assert_eq!(config.retention_secs(), 60);
    }

    #[test]
    fn store_parses_and_builds() {
        let store = StoreConfig::from_json(STORE).unwrap();
        assert_eq!(store.retention_secs, 600);
        assert_eq!(store.sync_config().retention, Duration::from_secs(600));

        let db = store.build_with_source(SequenceCounter::new(0)).unwrap();
        assert_eq!(db.table_names(), vec!["post".to_string(), "thread".to_string()]);
        assert_eq!(db.config().extra_columns, vec![Column::integer("user")]);
    }

    #[test]
    fn store_defaults() {
        let store = StoreConfig::from_json("{}").unwrap();
        assert!(store.tables.is_empty());
        assert_eq!(store.retention_secs, DEFAULT_RETENTION.as_secs());
        assert_eq!(store.param_style, ParamStyle::Qmark);
    }

    #[test]
    fn store_rejects_unknown_fields() {
        let err = StoreConfig::from_json(r#"{"tabels": []}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn store_reports_bad_table() {
        let store = StoreConfig::from_json(
            r#"{"tables": [{ "name": "t", "primary_key": ["missing"],
                             "schema": [{ "name": "id", "type": "integer" }] }]}"#,
        )
        .unwrap();
        assert!(matches!(store.build(), Err(CoreError::InvalidTable { .. })));
    }

    #[test]
    fn store_from_missing_file() {
        let err = StoreConfig::from_path(Path::new("/nonexistent/store.json")).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
