//! Sync coordinator.

use crate::clock::{Monotonic, SystemClock, TimestampSource};
use crate::config::SyncConfig;
use crate::error::{CoreError, CoreResult};
use crate::message::{SyncRequest, SyncResponse, TableDelta};
use crate::schema;
use crate::table::Table;
use crate::types::{Column, Extras, Timestamp, EPOCH};
use deltasync_storage::{StorageBackend, StorageTransaction, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one garbage collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GarbageReport {
    /// Timestamp drawn for the collection.
    pub now: Timestamp,
    /// Tombstones with `threshold < timestamp < 0` were purged.
    pub threshold: Timestamp,
    /// Purged tombstones per table.
    pub purged: BTreeMap<String, usize>,
}

impl GarbageReport {
    /// Returns the number of tombstones purged across all tables.
    pub fn total(&self) -> usize {
        self.purged.values().sum()
    }
}

/// Owns the registered tables and the timestamp source of one store.
///
/// A `SyncDatabase` holds no connection. Every operation takes the backend
/// to run against, so one instance can be shared (for example behind an
/// `Arc`) by callers that each own a connection.
///
/// # Example
///
/// ```
/// use deltasync_core::{Column, Extras, SyncConfig, SyncDatabase, SyncRequest, TableDelta};
/// use deltasync_core::clock::SequenceCounter;
/// use deltasync_storage::{row, SqliteBackend};
///
/// let db = SyncDatabase::with_source(SyncConfig::new(), SequenceCounter::new(0));
/// db.register_table("item", ["id"], vec![Column::integer("id"), Column::string("name")])
///     .unwrap();
///
/// let mut backend = SqliteBackend::open_in_memory().unwrap();
/// db.create_tables(&mut backend).unwrap();
///
/// let request = SyncRequest::initial()
///     .with_table("item", TableDelta::new().modify(row! { "id" => 1, "name" => "Item 1" }));
/// let response = db.synchronize(&mut backend, &request, &Extras::new()).unwrap();
/// assert_eq!(response.timestamp, 1);
/// assert!(response.table["item"].is_empty());
/// ```
pub struct SyncDatabase {
    config: SyncConfig,
    tables: RwLock<BTreeMap<String, Arc<Table>>>,
    source: Arc<dyn TimestampSource>,
}

impl SyncDatabase {
    /// Creates a store stamped with wall-clock seconds.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_source(config, Monotonic::new(SystemClock))
    }

    /// Creates a store with an explicit timestamp source.
    ///
    /// The source is used as given. Wrap it in [`Monotonic`] unless it
    /// already never repeats.
    pub fn with_source<S>(config: SyncConfig, source: S) -> Self
    where
        S: TimestampSource + 'static,
    {
        Self {
            config,
            tables: RwLock::new(BTreeMap::new()),
            source: Arc::new(source),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the timestamp source.
    pub fn source(&self) -> &Arc<dyn TimestampSource> {
        &self.source
    }

    /// Registers a table, replacing any table of the same name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTable` if the description is not usable.
    pub fn register_table<N, K>(&self, name: N, primary_key: K, schema: Vec<Column>) -> CoreResult<()>
    where
        N: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        let table = Table::new(
            name,
            primary_key.into_iter().map(Into::into).collect(),
            schema,
            &self.config.extra_columns,
            self.config.param_style,
        )?;
        let name = table.name().to_string();
        let replaced = self.tables.write().insert(name.clone(), Arc::new(table)).is_some();
        debug!("Registered table {} (replaced: {})", name, replaced);
        Ok(())
    }

    /// Returns the names of all registered tables in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Returns a registered table.
    pub fn table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    /// Returns the JSON-Schema contract for exchange payloads.
    pub fn schema(&self) -> serde_json::Value {
        let tables = self.tables.read();
        schema::contract(tables.values().map(Arc::as_ref))
    }

    fn check_backend<B: StorageBackend>(&self, backend: &B) -> CoreResult<()> {
        let style = backend.param_style();
        if style != self.config.param_style {
            return Err(CoreError::InvalidOperation {
                message: format!(
                    "backend uses {:?} placeholders, store is configured for {:?}",
                    style, self.config.param_style
                ),
            });
        }
        Ok(())
    }

    /// Orders partition values like the configured extra columns.
    fn resolve_extras(&self, extras: &Extras) -> CoreResult<Vec<Value>> {
        for column in extras.columns() {
            if !self.config.extra_columns.iter().any(|c| c.name == column) {
                return Err(CoreError::UnexpectedExtra {
                    column: column.to_string(),
                });
            }
        }
        self.config
            .extra_columns
            .iter()
            .map(|c| {
                extras.get(&c.name).cloned().ok_or_else(|| CoreError::MissingExtra {
                    column: c.name.clone(),
                })
            })
            .collect()
    }

    /// Runs one exchange: applies the client's changes and returns every
    /// change the client is missing.
    ///
    /// The request is validated before the store is touched. The new
    /// timestamp is drawn after the transaction has begun, so on backends
    /// that serialize writers at begin, timestamp order is commit order.
    ///
    /// # Errors
    ///
    /// - `UnknownTable`, `MalformedRequest`, `MissingExtra`,
    ///   `UnexpectedExtra` before any storage operation
    /// - `TimestampNotAfter` if the source does not move past the client
    /// - `Storage` if a statement fails
    ///
    /// On error nothing is written.
    pub fn synchronize<B: StorageBackend>(
        &self,
        backend: &mut B,
        request: &SyncRequest,
        extras: &Extras,
    ) -> CoreResult<SyncResponse> {
        self.check_backend(backend)?;
        let extras = self.resolve_extras(extras)?;

        let (all, plan) = {
            let tables = self.tables.read();
            let mut plan = Vec::with_capacity(request.table.len());
            for (name, delta) in &request.table {
                let table = tables.get(name).cloned().ok_or_else(|| CoreError::UnknownTable {
                    name: name.clone(),
                })?;
                table.validate(delta)?;
                plan.push((table, delta));
            }
            let all: Vec<Arc<Table>> = tables.values().cloned().collect();
            (all, plan)
        };

        let last = if request.timestamp < EPOCH {
            debug!("Clamping client timestamp {} to {}", request.timestamp, EPOCH);
            EPOCH
        } else {
            request.timestamp
        };

        let mut tx = backend.begin()?;
        match self.exchange(&mut tx, last, &all, &plan, &extras) {
            Ok(response) => {
                tx.commit()?;
                info!(
                    "Exchange committed: {} -> {} over {} tables",
                    last,
                    response.timestamp,
                    response.table.len()
                );
                Ok(response)
            }
            Err(e) => {
                warn!("Exchange from {} rolled back: {}", last, e);
                // Roll back, but don't mask the original error
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    fn exchange<T: StorageTransaction>(
        &self,
        tx: &mut T,
        last: Timestamp,
        all: &[Arc<Table>],
        plan: &[(Arc<Table>, &TableDelta)],
        extras: &[Value],
    ) -> CoreResult<SyncResponse> {
        self.observe_stored(tx, all)?;
        let next = self.source.next();
        if next <= last {
            return Err(CoreError::TimestampNotAfter { last, next });
        }

        let mut table = BTreeMap::new();
        for (unit, delta) in plan {
            let missing = unit.synchronize(tx, last, next, delta, extras)?;
            table.insert(unit.name().to_string(), missing);
        }
        Ok(SyncResponse {
            timestamp: next,
            table,
        })
    }

    /// Purges tombstones older than `retention` from every table.
    ///
    /// Draws one timestamp `now` and removes tombstones whose deletion time
    /// `d` satisfies `d < now - retention`. Runs in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` for a negative retention, `Storage` if a
    /// statement fails. On error nothing is purged.
    pub fn collect_garbage<B: StorageBackend>(
        &self,
        backend: &mut B,
        retention: Timestamp,
    ) -> CoreResult<GarbageReport> {
        self.check_backend(backend)?;
        if retention < 0 {
            return Err(CoreError::InvalidOperation {
                message: format!("retention must not be negative, got {retention}"),
            });
        }
        let tables: Vec<Arc<Table>> = self.tables.read().values().cloned().collect();

        let mut tx = backend.begin()?;
        if let Err(e) = self.observe_stored(&mut tx, &tables) {
            // Roll back, but don't mask the original error
            if let Err(rollback) = tx.rollback() {
                warn!("Rollback failed: {}", rollback);
            }
            return Err(e);
        }
        let now = self.source.next();
        let threshold = retention.saturating_sub(now);
        let mut report = GarbageReport {
            now,
            threshold,
            purged: BTreeMap::new(),
        };

        for table in &tables {
            match table.purge(&mut tx, threshold) {
                Ok(count) => {
                    report.purged.insert(table.name().to_string(), count);
                }
                Err(e) => {
                    warn!("Garbage collection rolled back at table {}: {}", table.name(), e);
                    // Roll back, but don't mask the original error
                    if let Err(rollback) = tx.rollback() {
                        warn!("Rollback failed: {}", rollback);
                    }
                    return Err(e);
                }
            }
        }
        tx.commit()?;

        info!(
            "Garbage collection at {} purged {} tombstones below {}",
            now,
            report.total(),
            -threshold
        );
        Ok(report)
    }

    /// Creates the backing table of every registered table if missing.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a statement fails. On error nothing is created.
    pub fn create_tables<B: StorageBackend>(&self, backend: &mut B) -> CoreResult<()> {
        self.check_backend(backend)?;
        let tables: Vec<Arc<Table>> = self.tables.read().values().cloned().collect();

        let mut tx = backend.begin()?;
        for table in &tables {
            if let Err(e) = table.create(&mut tx) {
                warn!("Creating table {} failed: {}", table.name(), e);
                // Roll back, but don't mask the original error
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback);
                }
                return Err(e);
            }
        }
        tx.commit()?;
        info!("Created {} tables", tables.len());
        Ok(())
    }

    /// Feeds the greatest stored timestamp to the timestamp source.
    ///
    /// Exchanges and collections already do this inside their own
    /// transaction before drawing a timestamp. This reads the mark up front,
    /// for example to report it after opening a store. Returns the greatest
    /// stored timestamp magnitude.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a table cannot be read.
    pub fn recover_clock<B: StorageBackend>(&self, backend: &mut B) -> CoreResult<Timestamp> {
        let tables: Vec<Arc<Table>> = self.tables.read().values().cloned().collect();

        let mut tx = backend.begin()?;
        let high = match self.observe_stored(&mut tx, &tables) {
            Ok(high) => high,
            Err(e) => {
                // Roll back, but don't mask the original error
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback);
                }
                return Err(e);
            }
        };
        tx.rollback()?;

        info!("Recovered clock at {}", high);
        Ok(high)
    }

    /// Reads the high-water mark of every table within `tx` and feeds the
    /// greatest to the source.
    ///
    /// Run after `begin` so that, with writers serialized at begin, no other
    /// process can commit above the mark before the next timestamp is drawn.
    fn observe_stored<T: StorageTransaction>(
        &self,
        tx: &mut T,
        tables: &[Arc<Table>],
    ) -> CoreResult<Timestamp> {
        let mut high = EPOCH;
        for table in tables {
            high = high.max(table.high_water_mark(tx)?);
        }
        self.source.observe(high);
        Ok(high)
    }
}

impl std::fmt::Debug for SyncDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDatabase")
            .field("config", &self.config)
            .field("tables", &self.table_names())
            .finish_non_exhaustive()
    }
}
