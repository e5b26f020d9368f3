use crate::config::{StoreConfig, StorePath};
use crate::error::{Result, StoreError};
use crate::schema::{Schema, TableDefinition, TableSchema};
use crate::table::TableHandle;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Outcome of registering a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    AlreadyExists,
}

/// Owns the connection to a single store and the tables registered against it.
///
/// A manager is open from [`StoreManager::open`] until [`StoreManager::close`]
/// consumes it; reopening needs a fresh manager. Dropping an unclosed manager
/// commits and releases the connection the same way `close` does.
pub struct StoreManager {
    path: StorePath,
    conn: Option<Connection>,
    catalog: TableSchema,
    tables: HashMap<String, TableDefinition>,
}

impl StoreManager {
    /// Open or create the store described by `config` and snapshot its catalog.
    #[instrument(skip_all, fields(path = %config.path))]
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let open_error = |source: rusqlite::Error| StoreError::Open {
            path: config.path.to_string(),
            source,
        };
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = match &config.path {
            StorePath::File(path) => Connection::open_with_flags(path, flags),
            StorePath::Memory => Connection::open_in_memory_with_flags(flags),
        }
        .map_err(open_error)?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(open_error)?;
        let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
        conn.pragma_update(None, "foreign_keys", foreign_keys)
            .map_err(open_error)?;

        // Reading the catalog also surfaces files that exist but are not databases
        let catalog = TableSchema::introspect(&conn).map_err(open_error)?;
        info!(tables = catalog.len(), "opened store");

        Ok(Self {
            path: config.path.clone(),
            conn: Some(conn),
            catalog,
            tables: HashMap::new(),
        })
    }

    /// Open a transient store with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    /// Run `f` against a freshly opened store, then commit and close it on
    /// every exit path.
    ///
    /// An error from `f` wins over an error from closing; the latter is logged.
    pub fn scoped<T, E, F>(config: &StoreConfig, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut StoreManager) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut store = Self::open(config)?;
        let outcome = f(&mut store);
        let closed = store.close();
        match outcome {
            Ok(value) => {
                closed?;
                Ok(value)
            }
            Err(err) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "failed to close store after error");
                }
                Err(err)
            }
        }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Catalog snapshot taken at open, plus tables created since.
    pub fn schema(&self) -> &TableSchema {
        &self.catalog
    }

    pub(crate) fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    /// Open the implicit write transaction if none is pending.
    pub(crate) fn begin_write(&self) -> Result<()> {
        let conn = self.connection()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|err| StoreError::database("begin transaction", err))?;
        }
        Ok(())
    }

    /// Create the table if it is missing and register it with this manager.
    ///
    /// An existing table is not an error: its live columns are checked against
    /// `definition` and it is registered as is.
    #[instrument(skip_all, fields(table = %definition.name))]
    pub fn register_table(&mut self, definition: TableDefinition) -> Result<Registration> {
        definition.validate()?;
        let conn = self.connection()?;

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE)",
                [&definition.name],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::database(format!("look up table {}", definition.name), err))?;

        let registration = if exists {
            if !self.catalog.contains(&definition.name) {
                // Created behind our back since the snapshot was taken
                let columns = TableSchema::table_columns(conn, &definition.name).map_err(|err| {
                    StoreError::database(format!("introspect table {}", definition.name), err)
                })?;
                self.catalog.insert(definition.name.clone(), columns);
            }
            self.catalog.check_definition(&definition)?;
            debug!("table already exists");
            Registration::AlreadyExists
        } else {
            self.begin_write()?;
            let conn = self.connection()?;
            let ddl_error = |source: rusqlite::Error| StoreError::Ddl {
                table: definition.name.clone(),
                source,
            };
            conn.execute_batch(&definition.create_statement())
                .map_err(ddl_error)?;
            let columns = TableSchema::table_columns(conn, &definition.name).map_err(ddl_error)?;
            self.catalog.insert(definition.name.clone(), columns);
            info!("created table");
            Registration::Created
        };

        self.tables.insert(definition.name.clone(), definition);
        Ok(registration)
    }

    /// Register every table of `schema` in order.
    pub fn register_schema(&mut self, schema: &Schema) -> Result<Vec<(String, Registration)>> {
        schema
            .tables
            .iter()
            .map(|table| {
                let registration = self.register_table(table.clone())?;
                Ok((table.name.clone(), registration))
            })
            .collect()
    }

    /// Handle for a table registered earlier.
    pub fn table(&self, name: &str) -> Result<TableHandle<'_>> {
        let definition = self
            .tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable {
                name: name.to_string(),
            })?;
        let columns = self
            .catalog
            .columns(name)
            .ok_or_else(|| StoreError::SchemaMismatch {
                table: name.to_string(),
                detail: "table is missing from the store catalog".to_string(),
            })?;
        Ok(TableHandle::new(self, definition, columns))
    }

    /// Names of the registered tables.
    pub fn registered(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Flush pending writes.
    pub fn commit(&self) -> Result<()> {
        let conn = self.connection()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|err| StoreError::database("commit", err))?;
            debug!(path = %self.path, "committed");
        }
        Ok(())
    }

    /// Commit, then release the connection.
    ///
    /// Closing a transient store discards everything written to it.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.conn.is_none() {
            return Ok(());
        }
        let committed = self.commit();
        let Some(conn) = self.conn.take() else {
            return committed;
        };
        if self.path.is_memory() {
            warn!("closing transient store, its contents are discarded");
        }
        conn.close()
            .map_err(|(_, err)| StoreError::database("close", err))?;
        info!(path = %self.path, "closed store");
        committed
    }
}

impl Drop for StoreManager {
    fn drop(&mut self) {
        if self.conn.is_some() {
            if let Err(err) = self.release() {
                warn!(path = %self.path, error = %err, "failed to release store on drop");
            }
        }
    }
}
