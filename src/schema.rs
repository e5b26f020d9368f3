use crate::error::{Result, StoreError};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub foreign_keys: Vec<ForeignKey>,
}

/// How a table's primary key gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Assigned by the engine on insert; excluded from inserted records.
    Generated,
    /// Supplied by the caller as part of every record.
    CallerSupplied,
    None,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn key_policy(&self) -> KeyPolicy {
        match self.columns.iter().find(|column| column.is_primary_key()) {
            Some(column) if column.is_generated() => KeyPolicy::Generated,
            Some(_) => KeyPolicy::CallerSupplied,
            None => KeyPolicy::None,
        }
    }

    /// Columns a record must supply on insert, in declared order.
    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|column| !column.is_generated())
    }

    /// Check the table and every column name against [`validate_identifier`].
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.name)?;
        for column in &self.columns {
            validate_identifier(&column.name)?;
        }
        for foreign_key in &self.foreign_keys {
            validate_identifier(&foreign_key.column)?;
            validate_identifier(&foreign_key.foreign_table)?;
            validate_identifier(&foreign_key.foreign_column)?;
        }
        Ok(())
    }

    /// Render the `CREATE TABLE` statement for this definition.
    pub fn create_statement(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::render).collect();
        parts.extend(self.foreign_keys.iter().map(ForeignKey::render));
        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }

    /// Build the parameterized insert statement over the insertable columns.
    pub fn insert_statement(&self) -> String {
        let columns: Vec<&str> = self
            .insertable_columns()
            .map(|column| column.name.as_str())
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            columns.join(", "),
            placeholders.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Integer)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Text)
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn primary_key(self) -> Self {
        self.with_constraint(ColumnConstraint::PrimaryKey)
    }

    /// Engine-assigned key. Implies primary key.
    pub fn auto_increment(self) -> Self {
        self.primary_key()
            .with_constraint(ColumnConstraint::AutoIncrement)
    }

    pub fn not_null(self) -> Self {
        self.with_constraint(ColumnConstraint::NotNull)
    }

    pub fn unique(self) -> Self {
        self.with_constraint(ColumnConstraint::Unique)
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(&ColumnConstraint::PrimaryKey)
    }

    pub fn is_generated(&self) -> bool {
        self.constraints.contains(&ColumnConstraint::AutoIncrement)
    }

    fn render(&self) -> String {
        let mut def = format!("{} {}", self.name, self.data_type.as_sql());
        // AUTOINCREMENT must directly follow PRIMARY KEY
        if self.is_primary_key() {
            def.push_str(" PRIMARY KEY");
            if self.is_generated() {
                def.push_str(" AUTOINCREMENT");
            }
        }
        if self.constraints.contains(&ColumnConstraint::NotNull) {
            def.push_str(" NOT NULL");
        }
        if self.constraints.contains(&ColumnConstraint::Unique) {
            def.push_str(" UNIQUE");
        }
        def
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKey,
    AutoIncrement,
    NotNull,
    Unique,
}

/// Declared reference from a column to another table's key.
///
/// Only declared in the DDL. Enforcement is left to the engine and is off
/// unless the store is opened with foreign keys enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        foreign_table: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            foreign_table: foreign_table.into(),
            foreign_column: foreign_column.into(),
        }
    }

    fn render(&self) -> String {
        format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            self.column, self.foreign_table, self.foreign_column
        )
    }
}

/// Table and column names are interpolated into DDL, so they are limited to
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// A column as reported by the live store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Snapshot of the store's catalog: table name to ordered columns.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TableSchema {
    tables: BTreeMap<String, Vec<ColumnInfo>>,
}

impl TableSchema {
    /// Read every user table and its columns from the catalog.
    pub fn introspect(conn: &Connection) -> rusqlite::Result<Self> {
        let mut schema = Self::default();
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for name in names {
            let columns = Self::table_columns(conn, &name)?;
            schema.tables.insert(name, columns);
        }
        Ok(schema)
    }

    pub(crate) fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<ColumnInfo>> {
        let mut stmt = conn.prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    primary_key: row.get::<_, i64>(3)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub(crate) fn insert(&mut self, table: impl Into<String>, columns: Vec<ColumnInfo>) {
        self.tables.insert(table.into(), columns);
    }

    /// Columns of `table`, matched case-insensitively as the engine does.
    pub fn columns(&self, table: &str) -> Option<&[ColumnInfo]> {
        self.tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, columns)| columns.as_slice())
    }

    pub fn contains(&self, table: &str) -> bool {
        self.columns(table).is_some()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Check that the definition's columns exist in the live table and appear
    /// in the same relative order.
    pub fn check_definition(&self, definition: &TableDefinition) -> Result<()> {
        let mismatch = |detail: String| StoreError::SchemaMismatch {
            table: definition.name.clone(),
            detail,
        };
        let live = self
            .columns(&definition.name)
            .ok_or_else(|| mismatch("table is missing from the store catalog".to_string()))?;

        let mut position = 0;
        for column in &definition.columns {
            let found = live[position..]
                .iter()
                .position(|info| info.name.eq_ignore_ascii_case(&column.name));
            match found {
                Some(offset) => position += offset + 1,
                None if live.iter().any(|info| info.name.eq_ignore_ascii_case(&column.name)) => {
                    return Err(mismatch(format!(
                        "column {} is declared out of order",
                        column.name
                    )))
                }
                None => {
                    return Err(mismatch(format!(
                        "column {} does not exist in the store",
                        column.name
                    )))
                }
            }
        }
        Ok(())
    }
}
