//! Rendering of table rows as report lines, optionally resolving the last
//! column through a [`LookupMap`].

use crate::error::{Result, StoreError};
use crate::schema::ColumnInfo;
use crate::value::{Record, Value};
use std::collections::BTreeMap;

/// In-memory id to text mapping built from a two-column reference table.
///
/// Never persisted. Rebuild it after the source table changes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LookupMap {
    table: String,
    entries: BTreeMap<i64, String>,
}

impl LookupMap {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: i64, value: impl Into<String>) -> Self {
        self.entries.insert(key, value.into());
        self
    }

    pub(crate) fn insert(&mut self, key: i64, value: String) {
        self.entries.insert(key, value);
    }

    /// Name of the table the map was built from.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self, key: i64) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Formats rows of one table.
///
/// Lines look like `person idx=1: lname=Miller fname=Eric age=55 school=Lehigh`.
/// The primary key column, when it is the first column, becomes the `idx=`
/// prefix. With a lookup, the last column is treated as a foreign key and
/// printed under the lookup table's name.
pub struct ReportFormatter<'a> {
    table: &'a str,
    columns: &'a [ColumnInfo],
    lookup: Option<&'a LookupMap>,
}

impl<'a> ReportFormatter<'a> {
    pub fn new(table: &'a str, columns: &'a [ColumnInfo]) -> Self {
        Self {
            table,
            columns,
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, lookup: Option<&'a LookupMap>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn format(&self, record: &Record) -> Result<String> {
        let values = record.values();
        if values.len() != self.columns.len() {
            return Err(StoreError::SchemaMismatch {
                table: self.table.to_string(),
                detail: format!(
                    "row has {} values but the table has {} columns",
                    values.len(),
                    self.columns.len()
                ),
            });
        }

        let keyed = self.columns.first().is_some_and(|column| column.primary_key);
        let mut line = match (keyed, values.first()) {
            (true, Some(key)) => format!("{} idx={}:", self.table, key),
            _ => format!("{}:", self.table),
        };
        let skip = usize::from(keyed);
        let last = values.len().saturating_sub(1);

        for (index, (column, value)) in self.columns.iter().zip(values).enumerate().skip(skip) {
            match self.lookup {
                Some(lookup) if index == last => {
                    let resolved = self.resolve(lookup, value)?;
                    line.push_str(&format!(" {}={}", lookup.table(), resolved));
                }
                _ => line.push_str(&format!(" {}={}", column.name, value)),
            }
        }
        Ok(line)
    }

    /// Any key the map cannot resolve is missing, whatever its type.
    fn resolve<'m>(&self, lookup: &'m LookupMap, value: &Value) -> Result<&'m str> {
        value
            .as_integer()
            .and_then(|key| lookup.get(key))
            .ok_or_else(|| StoreError::MissingLookupKey {
                table: self.table.to_string(),
                lookup: lookup.table().to_string(),
                key: value.clone(),
            })
    }
}
