//! Embedded SQLite table manager.
//!
//! # Intention
//!
//! - Own one connection to a single-file (or transient) SQLite store.
//! - Register typed table definitions, creating each table only when missing.
//! - Insert loosely typed records through prepared statements, scan tables
//!   back, and resolve foreign keys through an in-memory lookup for display.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here; the binary is a thin caller.
//! - Single writer, synchronous. No query planner, migrations or pooling.
//!
//! ```
//! use sqlite_tables::{record, roster, StoreManager};
//!
//! let mut store = StoreManager::open_in_memory()?;
//! store.register_table(roster::school_table())?;
//! store.register_table(roster::person_table())?;
//! store.table("school")?.insert(&record![1, "Lehigh"])?;
//! store.table("person")?.insert(&record!["Miller", "Eric", 55, 1])?;
//! store.commit()?;
//!
//! let schools = store.table("school")?.to_lookup_map()?;
//! let lines = store.table("person")?.dump_formatted(Some(&schools))?;
//! assert_eq!(lines, ["person idx=1: lname=Miller fname=Eric age=55 school=Lehigh"]);
//! store.close()?;
//! # Ok::<(), sqlite_tables::StoreError>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod report;
pub mod roster;
pub mod schema;
pub mod store;
pub mod table;
pub mod value;

pub use config::{StoreConfig, StorePath};
pub use error::{Result, StoreError};
pub use report::{LookupMap, ReportFormatter};
pub use schema::{
    ColumnConstraint, ColumnDefinition, ColumnInfo, DataType, ForeignKey, KeyPolicy, Schema,
    TableDefinition, TableSchema,
};
pub use store::{Registration, StoreManager};
pub use table::{SeedReport, TableHandle};
pub use value::{Record, Value};
