use crate::codec;
use crate::error::{Result, StoreError};
use crate::report::{LookupMap, ReportFormatter};
use crate::schema::{ColumnInfo, TableDefinition};
use crate::store::StoreManager;
use crate::value::{Record, Value};
use rusqlite::{params_from_iter, ErrorCode};
use tracing::{debug, instrument, warn, Level};

/// Counts from a tolerant batch insert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    /// Rows skipped because their key was already present.
    pub rejected: usize,
}

/// Row-level operations on one registered table.
pub struct TableHandle<'a> {
    store: &'a StoreManager,
    definition: &'a TableDefinition,
    columns: &'a [ColumnInfo],
}

impl<'a> TableHandle<'a> {
    pub(crate) fn new(
        store: &'a StoreManager,
        definition: &'a TableDefinition,
        columns: &'a [ColumnInfo],
    ) -> Self {
        Self {
            store,
            definition,
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &TableDefinition {
        self.definition
    }

    /// Live columns of the table, in storage order.
    pub fn columns(&self) -> &[ColumnInfo] {
        self.columns
    }

    /// Insert one record covering the insertable columns in declared order.
    ///
    /// Returns the row id the engine assigned. A row rejected by the engine
    /// fails with [`StoreError::ConstraintViolation`].
    #[instrument(skip_all, fields(table = %self.definition.name))]
    pub fn insert(&self, record: &Record) -> Result<i64> {
        let expected = self.definition.insertable_columns().count();
        if record.len() != expected {
            return Err(StoreError::SchemaMismatch {
                table: self.name().to_string(),
                detail: format!(
                    "record has {} values but {} columns are insertable",
                    record.len(),
                    expected
                ),
            });
        }
        let params = codec::bind(record)?;
        if tracing::enabled!(Level::DEBUG) {
            let literal = codec::encode(record)?;
            debug!(values = %literal, "inserting row");
        }

        self.store.begin_write()?;
        let conn = self.store.connection()?;
        let mut stmt = conn
            .prepare_cached(&self.definition.insert_statement())
            .map_err(|err| StoreError::database(format!("prepare insert into {}", self.name()), err))?;
        match stmt.execute(params_from_iter(params)) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, message))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                let duplicate_key = matches!(
                    err.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                );
                Err(StoreError::ConstraintViolation {
                    table: self.name().to_string(),
                    duplicate_key,
                    source: rusqlite::Error::SqliteFailure(err, message),
                })
            }
            Err(err) => Err(StoreError::database(format!("insert into {}", self.name()), err)),
        }
    }

    /// Insert every record, skipping rows whose key already exists.
    ///
    /// Duplicate-key rejections are logged and counted so a seeding run can be
    /// repeated; any other failure aborts the batch.
    pub fn seed<'r, I>(&self, records: I) -> Result<SeedReport>
    where
        I: IntoIterator<Item = &'r Record>,
    {
        let mut report = SeedReport::default();
        for record in records {
            match self.insert(record) {
                Ok(_) => report.inserted += 1,
                Err(err) if err.is_duplicate_key() => {
                    warn!(table = %self.name(), error = %err, "skipping duplicate row");
                    report.rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    /// Every row in storage order, all columns included.
    #[instrument(skip_all, fields(table = %self.definition.name))]
    pub fn scan_all(&self) -> Result<Vec<Record>> {
        let scan_error = |err: rusqlite::Error| StoreError::database(format!("scan {}", self.name()), err);
        let conn = self.store.connection()?;
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {}", self.definition.name))
            .map_err(scan_error)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|index| row.get::<_, Value>(index))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map(Record::new)
            })
            .map_err(scan_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(scan_error)?;
        debug!(rows = rows.len(), "scanned table");
        Ok(rows)
    }

    /// Build the id to text mapping of a two-column reference table.
    pub fn to_lookup_map(&self) -> Result<LookupMap> {
        let mismatch = |detail: String| StoreError::SchemaMismatch {
            table: self.name().to_string(),
            detail,
        };
        if self.columns.len() != 2 {
            return Err(mismatch(format!(
                "lookup tables need exactly two columns, found {}",
                self.columns.len()
            )));
        }

        let mut lookup = LookupMap::new(self.name());
        for record in self.scan_all()? {
            match record.values() {
                [Value::Integer(key), Value::Text(text)] => lookup.insert(*key, text.clone()),
                [key, text] => {
                    return Err(mismatch(format!(
                        "expected an (integer, text) row, found ({}, {})",
                        key.type_name(),
                        text.type_name()
                    )))
                }
                other => {
                    return Err(mismatch(format!("row has {} values", other.len())));
                }
            }
        }
        Ok(lookup)
    }

    /// One report line per row. With a lookup, the last column is resolved
    /// through it and a missing entry fails with
    /// [`StoreError::MissingLookupKey`].
    pub fn dump_formatted(&self, lookup: Option<&LookupMap>) -> Result<Vec<String>> {
        let formatter = ReportFormatter::new(self.name(), self.columns).with_lookup(lookup);
        let rows = self.scan_all()?;
        rows.iter()
            .map(|record| formatter.format(record))
            .collect()
    }
}
