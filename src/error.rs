use crate::value::Value;
use thiserror::Error;

/// Errors raised by the store, its tables and the value codec.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create table {table}: {source}")]
    Ddl {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid identifier {name:?}: only ASCII letters, digits and underscores are allowed")]
    InvalidIdentifier { name: String },

    #[error("insert into {table} rejected by constraint: {source}")]
    ConstraintViolation {
        table: String,
        /// Set when the row collided with an existing primary or unique key.
        duplicate_key: bool,
        #[source]
        source: rusqlite::Error,
    },

    #[error("table {name} was never registered")]
    UnknownTable { name: String },

    #[error("schema mismatch on {table}: {detail}")]
    SchemaMismatch { table: String, detail: String },

    #[error("{table} references key {key} which has no entry in {lookup}")]
    MissingLookupKey {
        table: String,
        lookup: String,
        /// The unresolved foreign key as stored, NULL included.
        key: Value,
    },

    #[error("unsupported value type {type_name}: only text and integer values can be inserted")]
    UnsupportedType { type_name: &'static str },

    #[error("{operation} failed: {source}")]
    Database {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Only reachable while a manager is being released: `close` consumes the
    /// manager, so public callers never observe it.
    #[error("store connection already released")]
    Closed,

    #[error("failed to load config from {path}: {reason}")]
    Config { path: String, reason: String },
}

impl StoreError {
    pub(crate) fn database(operation: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Database {
            operation: operation.into(),
            source,
        }
    }

    /// True for a constraint failure caused by a duplicate primary or unique key.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self,
            Self::ConstraintViolation {
                duplicate_key: true,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
