//! Table-oriented facade over one embedded SQLite database
//!
//! [`EngineFacade`] owns the engine runtime state and at most one open
//! [`Handle`]. Loading or creating a database releases the previous handle.
//! Operations that replace state take `&mut self`, so nothing can run against
//! a handle while an `init_engine` or `load_database` is in flight.
//!
//! Every fallible operation returns an [`EngineResult`]. Boundary operations
//! (engine init, load, export, table listing) also report their outcome to
//! the configured [`NotificationSink`].

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, StatementError};
use crate::handle::{Handle, HandleStats};
use crate::notify::{Notification, NotificationSink, TracingSink};
use crate::row::Row;
use crate::schema::{self, ColumnInfo, SchemaSnapshot, DEFAULT_COLUMN_TYPE};
use crate::statement::{self, Page};
use crate::value::Value;
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Linked engine details, captured by `init_engine`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    /// `sqlite_version()` as reported by the engine
    pub version: String,
    /// `sqlite3_libversion_number()`
    pub version_number: i32,
}

/// Default filename for exported images
pub const DEFAULT_EXPORT_FILENAME: &str = "database.sqlite";

/// The engine facade
pub struct EngineFacade {
    config: EngineConfig,
    runtime: Option<EngineInfo>,
    handle: Option<Handle>,
    sink: Box<dyn NotificationSink>,
}

impl EngineFacade {
    /// Create a facade. Nothing is initialized or opened yet.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            runtime: None,
            handle: None,
            sink: Box::new(TracingSink),
        }
    }

    /// Replace the notification sink
    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Configuration applied to every handle this facade opens
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Engine details, once `init_engine` has succeeded
    pub fn engine_info(&self) -> Option<&EngineInfo> {
        self.runtime.as_ref()
    }

    /// Whether a database handle is open
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Release the open handle, if any
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(origin = ?handle.origin(), "Releasing database handle");
        }
    }

    /// Initialize the engine runtime
    ///
    /// Probes the linked SQLite library on a blocking thread and checks it
    /// against `min_engine_version`. Calls after the first success return
    /// the cached [`EngineInfo`] without probing again.
    pub async fn init_engine(&mut self) -> EngineResult<EngineInfo> {
        if let Some(info) = &self.runtime {
            return Ok(info.clone());
        }

        let min_version = self.config.min_engine_version;
        let result = tokio::task::spawn_blocking(move || probe_engine(min_version))
            .await
            .map_err(|e| EngineError::Init(format!("Engine probe task failed: {}", e)))
            .and_then(|probe| probe);

        match &result {
            Ok(info) => {
                info!(version = %info.version, "Engine initialized");
                self.runtime = Some(info.clone());
                self.sink
                    .notify(Notification::ok(format!("SQLite {} ready", info.version)));
            }
            Err(err) => self.sink.notify(Notification::from(err)),
        }
        result
    }

    /// Replace the open handle with a new empty database
    pub fn create_database(&mut self) -> EngineResult<()> {
        self.require_runtime()?;
        self.close();
        let handle = Handle::create(&self.config)?;
        self.handle = Some(handle);
        self.sink.notify(Notification::ok("Created empty database"));
        Ok(())
    }

    /// Replace the open handle with a database opened from a file image
    ///
    /// The previous handle is released before the image is opened, so a
    /// failed load leaves the facade with no open database.
    pub async fn load_database(&mut self, bytes: Vec<u8>) -> EngineResult<()> {
        let result = self.open_image(bytes).await;
        match &result {
            Ok(()) => {
                let tables = self.list_tables().map(|t| t.len()).unwrap_or(0);
                self.sink
                    .notify(Notification::ok(format!("Database loaded ({} tables)", tables)));
            }
            Err(err) => self.sink.notify(Notification::from(err)),
        }
        result
    }

    /// Read a database file and load it
    pub async fn load_file(&mut self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = EngineError::Load(format!("Failed to read {}: {}", path.display(), e));
                self.sink.notify(Notification::from(&err));
                return Err(err);
            }
        };
        self.load_database(bytes).await
    }

    async fn open_image(&mut self, bytes: Vec<u8>) -> EngineResult<()> {
        self.require_runtime()?;
        self.close();

        let config = self.config.clone();
        let handle = tokio::task::spawn_blocking(move || Handle::from_image(bytes, &config))
            .await
            .map_err(|e| EngineError::Load(format!("Load task failed: {}", e)))??;

        self.handle = Some(handle);
        Ok(())
    }

    /// User table names in catalog order
    pub fn list_tables(&self) -> EngineResult<Vec<String>> {
        let result = match &self.handle {
            None => Err(EngineError::Catalog("No database is open".to_string())),
            Some(handle) => schema::list_tables(handle.connection())
                .map_err(|e| EngineError::Catalog(format!("Failed to list tables: {}", e))),
        };
        if let Err(err) = &result {
            self.sink.notify(Notification::from(err));
        }
        result
    }

    /// Ordered column definitions for `table`
    pub fn get_schema(&self, table: &str) -> EngineResult<Vec<ColumnInfo>> {
        let conn = self.conn()?;
        let known = schema::list_tables(conn).map_err(StatementError::from)?;
        if !known.iter().any(|name| name == table) {
            return Err(StatementError::UnknownTable(table.to_string()).into());
        }
        Ok(schema::table_columns(conn, table).map_err(StatementError::from)?)
    }

    /// First page using the configured default limit
    pub fn default_page(&self) -> Page {
        Page::first(self.config.default_page_limit)
    }

    /// Up to `page.limit` rows starting at `page.offset`, in engine order
    pub fn read_table(&self, table: &str, page: Page) -> EngineResult<Vec<Row>> {
        let (conn, snapshot) = self.snapshot(table)?;
        let rows = statement::select_page(snapshot.table(), page).query_rows(conn)?;
        debug!(table, offset = page.offset, limit = page.limit, rows = rows.len(), "Read page");
        Ok(rows)
    }

    /// Insert one row, returning its rowid
    pub fn insert_row(&self, table: &str, data: &Row) -> EngineResult<i64> {
        let (conn, snapshot) = self.snapshot(table)?;
        statement::insert(&snapshot, data)?.execute(conn)?;
        Ok(conn.last_insert_rowid())
    }

    /// Set the columns in `data` on every row where `pk_column = pk_value`
    ///
    /// Uniqueness of `pk_column` is not checked: all matching rows are
    /// updated. Returns the number of rows changed.
    pub fn update_row(
        &self,
        table: &str,
        data: &Row,
        pk_column: &str,
        pk_value: impl Into<Value>,
    ) -> EngineResult<usize> {
        let (conn, snapshot) = self.snapshot(table)?;
        let changed = statement::update(&snapshot, data, pk_column, pk_value.into())?.execute(conn)?;
        Ok(changed)
    }

    /// Delete every row where `pk_column = pk_value`. No match is not an error.
    pub fn delete_row(
        &self,
        table: &str,
        pk_column: &str,
        pk_value: impl Into<Value>,
    ) -> EngineResult<usize> {
        let (conn, snapshot) = self.snapshot(table)?;
        let changed = statement::delete(&snapshot, pk_column, pk_value.into())?.execute(conn)?;
        Ok(changed)
    }

    /// Add a nullable column, `TEXT` unless another type is given
    pub fn add_column(
        &self,
        table: &str,
        column: &str,
        column_type: Option<&str>,
    ) -> EngineResult<()> {
        let (conn, snapshot) = self.snapshot(table)?;
        let column_type = column_type.unwrap_or(DEFAULT_COLUMN_TYPE);
        statement::add_column(&snapshot, column, column_type)?.execute(conn)?;
        info!(table, column, column_type, "Added column");
        Ok(())
    }

    /// Serialize the open database to a SQLite file image
    ///
    /// The handle stays open.
    pub fn export_database(&self) -> EngineResult<Vec<u8>> {
        let result = match &self.handle {
            None => Err(EngineError::Export("No database is open".to_string())),
            Some(handle) => handle.serialize(),
        };
        match &result {
            Ok(bytes) => self.sink.notify(Notification::ok(format!(
                "Database exported ({} bytes)",
                bytes.len()
            ))),
            Err(err) => self.sink.notify(Notification::from(err)),
        }
        result
    }

    /// Export and write the image to `path`
    pub async fn export_to_file(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let path = path.as_ref();
        let bytes = self.export_database()?;
        if let Err(e) = tokio::fs::write(path, bytes).await {
            let err = EngineError::Export(format!("Failed to write {}: {}", path.display(), e));
            self.sink.notify(Notification::from(&err));
            return Err(err);
        }
        Ok(())
    }

    /// Page and table statistics for the open handle
    pub fn stats(&self) -> EngineResult<HandleStats> {
        match &self.handle {
            Some(handle) => handle.stats(),
            None => Err(StatementError::NoHandle.into()),
        }
    }

    fn require_runtime(&self) -> EngineResult<&EngineInfo> {
        self.runtime.as_ref().ok_or_else(|| {
            EngineError::Init("Engine is not initialized; call init_engine first".to_string())
        })
    }

    fn conn(&self) -> Result<&Connection, StatementError> {
        self.handle
            .as_ref()
            .map(Handle::connection)
            .ok_or(StatementError::NoHandle)
    }

    fn snapshot(&self, table: &str) -> Result<(&Connection, SchemaSnapshot), StatementError> {
        let conn = self.conn()?;
        let snapshot = SchemaSnapshot::capture(conn, table)?;
        Ok((conn, snapshot))
    }
}

impl std::fmt::Debug for EngineFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineFacade")
            .field("config", &self.config)
            .field("runtime", &self.runtime)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Check the linked engine can do what the facade needs
fn probe_engine(min_version: i32) -> EngineResult<EngineInfo> {
    let version_number = rusqlite::version_number();
    if version_number < min_version {
        return Err(EngineError::Init(format!(
            "SQLite {} is older than the required {}",
            rusqlite::version(),
            min_version
        )));
    }

    let conn = Connection::open_in_memory()
        .map_err(|e| EngineError::Init(format!("Failed to open probe database: {}", e)))?;
    let (version, omits_deserialize): (String, bool) = conn
        .query_row(
            "SELECT sqlite_version(), sqlite_compileoption_used('OMIT_DESERIALIZE')",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| EngineError::Init(format!("Engine probe query failed: {}", e)))?;

    if omits_deserialize {
        return Err(EngineError::Init(
            "SQLite was built without serialize/deserialize support".to_string(),
        ));
    }

    Ok(EngineInfo {
        version,
        version_number,
    })
}
