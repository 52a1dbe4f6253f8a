//! Per-table sync unit.
//!
//! A [`Table`] renders its statements once, at registration, from the column
//! lists it was built with. Only identifiers that passed validation are
//! interpolated into statement text; every value is bound.
//!
//! All reads share one condition shape, `low < timestamp < high`, scoped by
//! the extra columns. Live rows changed since the client's last exchange are
//! found with `(T_last, T_new)`; tombstones created in the same window with
//! `(-T_new, -T_last)`.

use crate::error::{CoreError, CoreResult};
use crate::message::TableDelta;
use crate::types::{Column, Timestamp, TIMESTAMP_COLUMN};
use deltasync_storage::{ParamStyle, Row, StorageTransaction, Value};
use std::collections::HashSet;
use tracing::debug;

/// Returns true if `name` may be used as a table or column name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

fn quote_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().map(quote).collect::<Vec<_>>().join(",")
}

/// Statement text rendered for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    /// Insert-or-replace of one row on the primary key plus extras.
    ///
    /// Binds schema values, the timestamp, then extras.
    pub upsert: String,
    /// Turns one live row into a tombstone.
    ///
    /// Binds the negated timestamp, key values, then extras.
    pub mark_deleted: String,
    /// Schema columns of rows with `low < timestamp < high`.
    ///
    /// Binds low, high, then extras.
    pub select_changed: String,
    /// Key columns of rows with `low < timestamp < high`.
    ///
    /// Binds low, high, then extras.
    pub select_deleted_keys: String,
    /// Deletes tombstones with `threshold < timestamp < 0`, in every partition.
    pub purge: String,
    /// Greatest timestamp magnitude stored in the table.
    pub high_water_mark: String,
    /// Table definition for the persisted layout.
    pub create_table: String,
    /// Index on the timestamp column.
    pub create_index: String,
}

impl Statements {
    fn render(
        name: &str,
        schema: &[Column],
        primary_key: &[String],
        extras: &[Column],
        style: ParamStyle,
    ) -> Self {
        let table = quote(name);
        let ts = quote(TIMESTAMP_COLUMN);
        let schema_names: Vec<&str> = schema.iter().map(|c| c.name.as_str()).collect();
        let key_names: Vec<&str> = primary_key.iter().map(String::as_str).collect();
        let extra_names: Vec<&str> = extras.iter().map(|c| c.name.as_str()).collect();

        let conflict = quote_list(key_names.iter().chain(&extra_names).copied());
        let order = quote_list(key_names.iter().copied());

        let upsert = {
            let mut p = style.placeholders();
            let columns = quote_list(
                schema_names
                    .iter()
                    .copied()
                    .chain([TIMESTAMP_COLUMN])
                    .chain(extra_names.iter().copied()),
            );
            let values = p.list(schema.len() + 1 + extras.len());
            let updates = schema_names
                .iter()
                .copied()
                .filter(|c| !key_names.contains(c))
                .chain([TIMESTAMP_COLUMN])
                .map(|c| format!("{0}=excluded.{0}", quote(c)))
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "INSERT INTO {table} ({columns}) VALUES ({values}) \
                 ON CONFLICT ({conflict}) DO UPDATE SET {updates}"
            )
        };

        let mark_deleted = {
            let mut p = style.placeholders();
            let set = format!("{ts}={}", p.bind());
            let mut conditions: Vec<String> = key_names
                .iter()
                .chain(&extra_names)
                .map(|c| format!("{}={}", quote(c), p.bind()))
                .collect();
            conditions.push(format!("{ts}>0"));
            format!(
                "UPDATE {table} SET {set} WHERE {}",
                conditions.join(" AND ")
            )
        };

        let window = |projection: &str| {
            let mut p = style.placeholders();
            let mut conditions = vec![format!("{}<{ts}", p.bind()), format!("{ts}<{}", p.bind())];
            conditions.extend(
                extra_names
                    .iter()
                    .map(|c| format!("{}={}", quote(c), p.bind())),
            );
            format!(
                "SELECT {projection} FROM {table} WHERE {} ORDER BY {order}",
                conditions.join(" AND ")
            )
        };
        let select_changed = window(&quote_list(schema_names.iter().copied()));
        let select_deleted_keys = window(&order);

        let purge = {
            let mut p = style.placeholders();
            format!("DELETE FROM {table} WHERE {}<{ts} AND {ts}<0", p.bind())
        };

        // Each arm is a bare MIN/MAX over the indexed column.
        let high_water_mark = format!(
            "SELECT MAX(mark) FROM (SELECT MAX({ts}) AS mark FROM {table} \
             UNION ALL SELECT -MIN({ts}) FROM {table}) AS marks"
        );

        let create_table = {
            let mut defs: Vec<String> = schema
                .iter()
                .map(|c| format!("{} {}", quote(&c.name), c.ty.sql_type()))
                .collect();
            defs.push(format!("{ts} INTEGER NOT NULL"));
            defs.extend(
                extras
                    .iter()
                    .map(|c| format!("{} {} NOT NULL", quote(&c.name), c.ty.sql_type())),
            );
            defs.push(format!("PRIMARY KEY ({conflict})"));
            format!("CREATE TABLE IF NOT EXISTS {table} ({})", defs.join(", "))
        };
        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {table} ({ts})",
            quote(&format!("{name}_{TIMESTAMP_COLUMN}"))
        );

        Self {
            upsert,
            mark_deleted,
            select_changed,
            select_deleted_keys,
            purge,
            high_water_mark,
            create_table,
            create_index,
        }
    }
}

/// A registered table and its rendered statements.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    schema: Vec<Column>,
    primary_key: Vec<String>,
    extras: Vec<Column>,
    statements: Statements,
}

impl Table {
    /// Builds a table from its logical schema.
    ///
    /// `extras` are the store-wide partition columns. They are not part of
    /// the logical schema and must not appear in it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTable` if a name is not a plain identifier, the
    /// primary key is empty, repeats a column or names a column outside the
    /// schema, or a schema column is reserved or collides with an extra.
    pub fn new(
        name: impl Into<String>,
        primary_key: Vec<String>,
        schema: Vec<Column>,
        extras: &[Column],
        style: ParamStyle,
    ) -> CoreResult<Self> {
        let name = name.into();
        let invalid = |message: String| CoreError::invalid_table(name.as_str(), message);

        if !is_identifier(&name) {
            return Err(invalid("table name is not an identifier".into()));
        }
        if schema.is_empty() {
            return Err(invalid("schema has no columns".into()));
        }

        let mut columns = HashSet::new();
        for column in &schema {
            if !is_identifier(&column.name) {
                return Err(invalid(format!("column {:?} is not an identifier", column.name)));
            }
            if column.name == TIMESTAMP_COLUMN {
                return Err(invalid(format!("column {TIMESTAMP_COLUMN} is reserved")));
            }
            if extras.iter().any(|e| e.name == column.name) {
                return Err(invalid(format!("column {} is an extra column", column.name)));
            }
            if !columns.insert(column.name.as_str()) {
                return Err(invalid(format!("duplicate column {}", column.name)));
            }
        }
        for extra in extras {
            if !is_identifier(&extra.name) || extra.name == TIMESTAMP_COLUMN {
                return Err(invalid(format!("extra column {:?} is not usable", extra.name)));
            }
        }

        if primary_key.is_empty() {
            return Err(invalid("empty primary key".into()));
        }
        let mut seen = HashSet::new();
        for key in &primary_key {
            if !columns.contains(key.as_str()) {
                return Err(invalid(format!("primary key column {key} not in schema")));
            }
            if !seen.insert(key.as_str()) {
                return Err(invalid(format!("primary key repeats {key}")));
            }
        }

        let statements = Statements::render(&name, &schema, &primary_key, extras, style);
        Ok(Self {
            name,
            schema,
            primary_key,
            extras: extras.to_vec(),
            statements,
        })
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the logical schema.
    pub fn schema(&self) -> &[Column] {
        &self.schema
    }

    /// Returns the primary-key column names.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Returns the partition columns.
    pub fn extras(&self) -> &[Column] {
        &self.extras
    }

    /// Returns the rendered statements.
    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    /// Checks that every row of a delta has the shape this table expects.
    ///
    /// Modified rows must carry exactly the schema columns; deleted rows
    /// exactly the primary-key columns. Key columns must not be null.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRequest` naming the first offending row.
    pub fn validate(&self, delta: &TableDelta) -> CoreResult<()> {
        for (index, row) in delta.modified.iter().enumerate() {
            self.check_shape(row, self.schema.iter().map(|c| c.name.as_str()), "modified", index)?;
            self.check_key(row, "modified", index)?;
        }
        for (index, row) in delta.deleted.iter().enumerate() {
            self.check_shape(row, self.primary_key.iter().map(String::as_str), "deleted", index)?;
            self.check_key(row, "deleted", index)?;
        }
        Ok(())
    }

    fn check_key(&self, row: &Row, list: &str, index: usize) -> CoreResult<()> {
        match self.primary_key.iter().find(|c| row.get(*c).is_some_and(Value::is_null)) {
            Some(column) => Err(CoreError::malformed(format!(
                "{}.{list}[{index}] has null key column {column}",
                self.name
            ))),
            None => Ok(()),
        }
    }

    fn check_shape<'a>(
        &self,
        row: &Row,
        expected: impl Iterator<Item = &'a str>,
        list: &str,
        index: usize,
    ) -> CoreResult<()> {
        let mut matched = 0;
        for column in expected {
            if !row.contains_key(column) {
                return Err(CoreError::malformed(format!(
                    "{}.{list}[{index}] is missing column {column}",
                    self.name
                )));
            }
            matched += 1;
        }
        if row.len() != matched {
            let unknown = row
                .keys()
                .find(|k| !self.expects(k, list))
                .map_or("?", String::as_str);
            return Err(CoreError::malformed(format!(
                "{}.{list}[{index}] has unknown column {unknown}",
                self.name
            )));
        }
        Ok(())
    }

    fn expects(&self, column: &str, list: &str) -> bool {
        if list == "deleted" {
            self.primary_key.iter().any(|k| k == column)
        } else {
            self.schema.iter().any(|c| c.name == column)
        }
    }

    /// Writes rows under `timestamp`, replacing rows that share a key.
    ///
    /// `extras` are the partition values in the order of [`Table::extras`].
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub fn upsert_modified<T: StorageTransaction>(
        &self,
        tx: &mut T,
        rows: &[Row],
        timestamp: Timestamp,
        extras: &[Value],
    ) -> CoreResult<usize> {
        let param_sets: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| {
                let mut params: Vec<Value> = self
                    .schema
                    .iter()
                    .map(|c| row.get(&c.name).cloned().unwrap_or(Value::Null))
                    .collect();
                params.push(Value::Integer(timestamp));
                params.extend_from_slice(extras);
                params
            })
            .collect();
        Ok(tx.execute_many(&self.statements.upsert, &param_sets)?)
    }

    /// Tombstones the live rows matching each key at time `timestamp`.
    ///
    /// Keys with no live row are skipped. Returns the number of rows
    /// tombstoned.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub fn mark_deleted<T: StorageTransaction>(
        &self,
        tx: &mut T,
        keys: &[Row],
        timestamp: Timestamp,
        extras: &[Value],
    ) -> CoreResult<usize> {
        let param_sets: Vec<Vec<Value>> = keys
            .iter()
            .map(|key| {
                let mut params = vec![Value::Integer(-timestamp)];
                params.extend(
                    self.primary_key
                        .iter()
                        .map(|c| key.get(c).cloned().unwrap_or(Value::Null)),
                );
                params.extend_from_slice(extras);
                params
            })
            .collect();
        Ok(tx.execute_many(&self.statements.mark_deleted, &param_sets)?)
    }

    /// Returns the schema columns of rows with `low < timestamp < high`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn select_changed<T: StorageTransaction>(
        &self,
        tx: &mut T,
        low: Timestamp,
        high: Timestamp,
        extras: &[Value],
    ) -> CoreResult<Vec<Row>> {
        self.window(tx, &self.statements.select_changed, low, high, extras)
    }

    /// Returns the key columns of rows with `low < timestamp < high`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn select_deleted_keys<T: StorageTransaction>(
        &self,
        tx: &mut T,
        low: Timestamp,
        high: Timestamp,
        extras: &[Value],
    ) -> CoreResult<Vec<Row>> {
        self.window(tx, &self.statements.select_deleted_keys, low, high, extras)
    }

    fn window<T: StorageTransaction>(
        &self,
        tx: &mut T,
        sql: &str,
        low: Timestamp,
        high: Timestamp,
        extras: &[Value],
    ) -> CoreResult<Vec<Row>> {
        let mut params = vec![Value::Integer(low), Value::Integer(high)];
        params.extend_from_slice(extras);
        Ok(tx.query(sql, &params)?.into_rows())
    }

    /// Applies a client's changes and returns what the client is missing.
    ///
    /// Modified rows are written before deleted keys are tombstoned, so a
    /// row present in both lists ends up deleted. The open windows exclude
    /// `new_timestamp`, which keeps the client's own writes out of the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails. The caller must roll back.
    pub fn synchronize<T: StorageTransaction>(
        &self,
        tx: &mut T,
        last_timestamp: Timestamp,
        new_timestamp: Timestamp,
        delta: &TableDelta,
        extras: &[Value],
    ) -> CoreResult<TableDelta> {
        let written = self.upsert_modified(tx, &delta.modified, new_timestamp, extras)?;
        let tombstoned = self.mark_deleted(tx, &delta.deleted, new_timestamp, extras)?;

        let modified = self.select_changed(tx, last_timestamp, new_timestamp, extras)?;
        let deleted = self.select_deleted_keys(tx, -new_timestamp, -last_timestamp, extras)?;

        debug!(
            "Table {}: wrote {}, tombstoned {}, returning {} modified and {} deleted",
            self.name,
            written,
            tombstoned,
            modified.len(),
            deleted.len()
        );
        Ok(TableDelta { modified, deleted })
    }

    /// Hard-deletes tombstones with `threshold < timestamp < 0`.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn purge<T: StorageTransaction>(&self, tx: &mut T, threshold: Timestamp) -> CoreResult<usize> {
        let purged = tx.execute(&self.statements.purge, &[Value::Integer(threshold)])?;
        debug!("Table {}: purged {} tombstones", self.name, purged);
        Ok(purged)
    }

    /// Returns the greatest timestamp magnitude stored, or 0 if empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn high_water_mark<T: StorageTransaction>(&self, tx: &mut T) -> CoreResult<Timestamp> {
        let set = tx.query(&self.statements.high_water_mark, &[])?;
        Ok(set.scalar().and_then(Value::as_integer).unwrap_or(0))
    }

    /// Creates the backing table and its timestamp index if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub fn create<T: StorageTransaction>(&self, tx: &mut T) -> CoreResult<()> {
        tx.execute(&self.statements.create_table, &[])?;
        tx.execute(&self.statements.create_index, &[])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deltasync_storage::{row, SqliteBackend, StorageBackend};

    fn item() -> Table {
        Table::new(
            "item",
            vec!["id".into()],
            vec![Column::integer("id"), Column::string("name")],
            &[],
            ParamStyle::Qmark,
        )
        .unwrap()
    }

    fn backend_for(table: &Table) -> SqliteBackend {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        let mut tx = backend.begin().unwrap();
        table.create(&mut tx).unwrap();
        tx.commit().unwrap();
        backend
    }

    fn timestamps(backend: &SqliteBackend) -> Vec<(i64, i64)> {
        let conn = backend.connection();
        let mut stmt = conn
            .prepare("SELECT id, timestamp FROM item ORDER BY id")
            .unwrap();
        let rows: Vec<(i64, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        rows
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("item"));
        assert!(is_identifier("_x9"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("x\"; DROP TABLE y"));
    }

    #[test]
    fn rejects_bad_registrations() {
        let schema = || vec![Column::integer("id"), Column::string("name")];
        let cases = [
            Table::new("bad name", vec!["id".into()], schema(), &[], ParamStyle::Qmark),
            Table::new("t", vec![], schema(), &[], ParamStyle::Qmark),
            Table::new("t", vec!["nope".into()], schema(), &[], ParamStyle::Qmark),
            Table::new("t", vec!["id".into(), "id".into()], schema(), &[], ParamStyle::Qmark),
            Table::new(
                "t",
                vec!["id".into()],
                vec![Column::integer("id"), Column::integer("timestamp")],
                &[],
                ParamStyle::Qmark,
            ),
            Table::new(
                "t",
                vec!["id".into()],
                vec![Column::integer("id"), Column::integer("user")],
                &[Column::integer("user")],
                ParamStyle::Qmark,
            ),
            Table::new("t", vec!["id".into()], vec![], &[], ParamStyle::Qmark),
        ];
        for result in cases {
            assert!(matches!(result, Err(CoreError::InvalidTable { .. })));
        }
    }

    #[test]
    fn qmark_statements() {
        let s = item().statements().clone();
        assert_eq!(
            s.upsert,
            "INSERT INTO \"item\" (\"id\",\"name\",\"timestamp\") VALUES (?,?,?) \
             ON CONFLICT (\"id\") DO UPDATE SET \"name\"=excluded.\"name\",\"timestamp\"=excluded.\"timestamp\""
        );
        assert_eq!(
            s.mark_deleted,
            "UPDATE \"item\" SET \"timestamp\"=? WHERE \"id\"=? AND \"timestamp\">0"
        );
        assert_eq!(
            s.select_changed,
            "SELECT \"id\",\"name\" FROM \"item\" WHERE ?<\"timestamp\" AND \"timestamp\"<? ORDER BY \"id\""
        );
        assert_eq!(
            s.select_deleted_keys,
            "SELECT \"id\" FROM \"item\" WHERE ?<\"timestamp\" AND \"timestamp\"<? ORDER BY \"id\""
        );
        assert_eq!(
            s.purge,
            "DELETE FROM \"item\" WHERE ?<\"timestamp\" AND \"timestamp\"<0"
        );
    }

    #[test]
    fn dollar_statements_number_in_bind_order() {
        let table = Table::new(
            "post",
            vec!["id".into()],
            vec![Column::integer("id"), Column::string("body")],
            &[Column::integer("user")],
            ParamStyle::Dollar,
        )
        .unwrap();
        let s = table.statements();
        assert!(s.upsert.contains("VALUES ($1,$2,$3,$4)"));
        assert!(s.upsert.contains("ON CONFLICT (\"id\",\"user\")"));
        assert_eq!(
            s.mark_deleted,
            "UPDATE \"post\" SET \"timestamp\"=$1 WHERE \"id\"=$2 AND \"user\"=$3 AND \"timestamp\">0"
        );
        assert_eq!(
            s.select_changed,
            "SELECT \"id\",\"body\" FROM \"post\" WHERE $1<\"timestamp\" AND \"timestamp\"<$2 AND \"user\"=$3 ORDER BY \"id\""
        );
        assert_eq!(s.purge, "DELETE FROM \"post\" WHERE $1<\"timestamp\" AND \"timestamp\"<0");
    }

    #[test]
    fn key_only_table_updates_timestamp() {
        let table = Table::new(
            "tag",
            vec!["name".into()],
            vec![Column::string("name")],
            &[],
            ParamStyle::Qmark,
        )
        .unwrap();
        assert!(table
            .statements()
            .upsert
            .ends_with("DO UPDATE SET \"timestamp\"=excluded.\"timestamp\""));
    }

    #[test]
    fn ddl_layout() {
        let table = Table::new(
            "post",
            vec!["id".into()],
            vec![Column::integer("id"), Column::string("body")],
            &[Column::integer("user")],
            ParamStyle::Qmark,
        )
        .unwrap();
        assert_eq!(
            table.statements().create_table,
            "CREATE TABLE IF NOT EXISTS \"post\" (\"id\" INTEGER, \"body\" TEXT, \
             \"timestamp\" INTEGER NOT NULL, \"user\" INTEGER NOT NULL, PRIMARY KEY (\"id\",\"user\"))"
        );
        assert_eq!(
            table.statements().create_index,
            "CREATE INDEX IF NOT EXISTS \"post_timestamp\" ON \"post\" (\"timestamp\")"
        );
    }

    #[test]
    fn validate_row_shapes() {
        let table = item();
        let ok = TableDelta::new()
            .modify(row! { "id" => 1, "name" => "a" })
            .delete(row! { "id" => 2 });
        table.validate(&ok).unwrap();

        let missing = TableDelta::new().modify(row! { "id" => 1 });
        let err = table.validate(&missing).unwrap_err();
        assert!(err.to_string().contains("missing column name"));

        let unknown = TableDelta::new().modify(row! { "id" => 1, "name" => "a", "x" => 0 });
        let err = table.validate(&unknown).unwrap_err();
        assert!(err.to_string().contains("unknown column x"));

        let payload_in_delete = TableDelta::new().delete(row! { "id" => 1, "name" => "a" });
        let err = table.validate(&payload_in_delete).unwrap_err();
        assert!(err.to_string().contains("item.deleted[0]"));
    }

    #[test]
    fn validate_rejects_null_keys() {
        let table = item();
        let nameless = TableDelta::new().modify(row! { "id" => 1, "name" => () });
        table.validate(&nameless).unwrap();

        let keyless = TableDelta::new()
            .modify(row! { "id" => 1, "name" => "a" })
            .modify(row! { "id" => (), "name" => "b" });
        let err = table.validate(&keyless).unwrap_err();
        assert!(matches!(err, CoreError::MalformedRequest { .. }));
        assert!(err.to_string().contains("item.modified[1] has null key column id"));

        let keyless = TableDelta::new().delete(row! { "id" => () });
        let err = table.validate(&keyless).unwrap_err();
        assert!(err.to_string().contains("item.deleted[0] has null key column id"));
    }

    #[test]
    fn upsert_then_tombstone() {
        let table = item();
        let mut backend = backend_for(&table);

        let mut tx = backend.begin().unwrap();
        let rows = vec![row! { "id" => 1, "name" => "a" }, row! { "id" => 2, "name" => "b" }];
        assert_eq!(table.upsert_modified(&mut tx, &rows, 3, &[]).unwrap(), 2);
        let rows = vec![row! { "id" => 1, "name" => "a2" }];
        assert_eq!(table.upsert_modified(&mut tx, &rows, 4, &[]).unwrap(), 1);
        assert_eq!(
            table
                .mark_deleted(&mut tx, &[row! { "id" => 2 }, row! { "id" => 9 }], 5, &[])
                .unwrap(),
            1
        );
        // already a tombstone
        assert_eq!(table.mark_deleted(&mut tx, &[row! { "id" => 2 }], 6, &[]).unwrap(), 0);
        tx.commit().unwrap();

        assert_eq!(timestamps(&backend), vec![(1, 4), (2, -5)]);
    }

    #[test]
    fn windows_are_open() {
        let table = item();
        let mut backend = backend_for(&table);
        let mut tx = backend.begin().unwrap();
        for (id, ts) in [(1, 1), (2, 2), (3, 3)] {
            table
                .upsert_modified(&mut tx, &[row! { "id" => id, "name" => "n" }], ts, &[])
                .unwrap();
        }
        table.mark_deleted(&mut tx, &[row! { "id" => 3 }], 4, &[]).unwrap();

        let changed = table.select_changed(&mut tx, 1, 3, &[]).unwrap();
        assert_eq!(changed, vec![row! { "id" => 2, "name" => "n" }]);
        let deleted = table.select_deleted_keys(&mut tx, -5, -3, &[]).unwrap();
        assert_eq!(deleted, vec![row! { "id" => 3 }]);
        assert!(table.select_deleted_keys(&mut tx, -4, 0, &[]).unwrap().is_empty());
    }

    #[test]
    fn purge_and_high_water() {
        let table = item();
        let mut backend = backend_for(&table);
        let mut tx = backend.begin().unwrap();
        assert_eq!(table.high_water_mark(&mut tx).unwrap(), 0);
        for (id, ts) in [(1, 1), (2, 3), (3, 1), (4, 2), (5, 3), (6, 4)] {
            table
                .upsert_modified(&mut tx, &[row! { "id" => id, "name" => "n" }], ts, &[])
                .unwrap();
        }
        for (id, ts) in [(3, 1), (4, 2), (5, 3), (6, 4)] {
            table.mark_deleted(&mut tx, &[row! { "id" => id }], ts, &[]).unwrap();
        }
        assert_eq!(table.high_water_mark(&mut tx).unwrap(), 4);
        assert_eq!(table.purge(&mut tx, -5 + 2).unwrap(), 2);
        tx.commit().unwrap();

        assert_eq!(timestamps(&backend), vec![(1, 1), (2, 3), (5, -3), (6, -4)]);
    }
}
