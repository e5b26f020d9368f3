//! Seeded scenarios: the school/person join and the player roster.
//!
//! Seeding is repeatable. Tables are only created when missing, schools are
//! inserted with duplicate keys skipped, and people (whose ids are assigned
//! by the engine) are only inserted when their table was just created.

use crate::error::Result;
use crate::record;
use crate::schema::{ColumnDefinition, ForeignKey, Schema, TableDefinition};
use crate::store::{Registration, StoreManager};
use crate::table::SeedReport;
use crate::value::Record;
use tracing::info;

pub const SCHOOL: &str = "school";
pub const PERSON: &str = "person";
pub const PLAYER: &str = "player";

pub fn school_table() -> TableDefinition {
    TableDefinition::new(SCHOOL)
        .with_column(ColumnDefinition::integer("id").primary_key())
        .with_column(ColumnDefinition::text("name"))
}

pub fn person_table() -> TableDefinition {
    TableDefinition::new(PERSON)
        .with_column(ColumnDefinition::integer("id").auto_increment())
        .with_column(ColumnDefinition::text("lname"))
        .with_column(ColumnDefinition::text("fname"))
        .with_column(ColumnDefinition::integer("age"))
        .with_column(ColumnDefinition::integer("sch_id"))
        .with_foreign_key(ForeignKey::new("sch_id", SCHOOL, "id"))
}

pub fn player_table() -> TableDefinition {
    TableDefinition::new(PLAYER)
        .with_column(ColumnDefinition::integer("id").primary_key())
        .with_column(ColumnDefinition::text("lname"))
        .with_column(ColumnDefinition::text("fname"))
        .with_column(ColumnDefinition::integer("age"))
}

/// The person and school tables, lookup table first.
pub fn schema() -> Schema {
    Schema::new().add_table(school_table()).add_table(person_table())
}

pub fn schools() -> Vec<Record> {
    vec![
        record![1, "Lehigh"],
        record![2, "W-L HS"],
        record![3, "Williams"],
    ]
}

pub fn persons() -> Vec<Record> {
    vec![
        record!["Miller", "Eric", 55, 1],
        record!["Miller", "Nicky", 23, 2],
        record!["Stanley", "Jay", 53, 3],
        record!["Stanley", "Ben", 23, 2],
    ]
}

pub fn players() -> Vec<Record> {
    vec![
        record![1, "Miller", "Eric", 55],
        record![2, "Miller", "Nicky", 23],
        record![3, "Stanley", "Jay", 53],
        record![4, "Stanley", "Ben", 23],
    ]
}

/// What a seeding run changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub schools: SeedReport,
    pub persons: SeedReport,
}

/// Create the school and person tables if needed, insert their rows, commit.
pub fn seed(store: &mut StoreManager) -> Result<SeedSummary> {
    let registrations = store.register_schema(&schema())?;
    let person_created = registrations
        .iter()
        .any(|(name, registration)| name == PERSON && *registration == Registration::Created);

    let school_report = store.table(SCHOOL)?.seed(&schools())?;
    let person_report = if person_created {
        store.table(PERSON)?.seed(&persons())?
    } else {
        SeedReport::default()
    };
    store.commit()?;

    info!(
        schools = school_report.inserted,
        duplicate_schools = school_report.rejected,
        persons = person_report.inserted,
        "seeded roster"
    );
    Ok(SeedSummary {
        schools: school_report,
        persons: person_report,
    })
}

/// One line per person with the school id resolved to its name.
///
/// Read-only: tables missing from the store are not created, so an unseeded
/// store fails with `UnknownTable`.
pub fn report(store: &mut StoreManager) -> Result<Vec<String>> {
    for definition in schema().tables {
        if store.schema().contains(&definition.name) {
            store.register_table(definition)?;
        }
    }
    let lookup = store.table(SCHOOL)?.to_lookup_map()?;
    store.table(PERSON)?.dump_formatted(Some(&lookup))
}

/// Create and fill the player table if needed, then list it.
pub fn player_roster(store: &mut StoreManager) -> Result<Vec<String>> {
    store.register_table(player_table())?;
    let report = store.table(PLAYER)?.seed(&players())?;
    store.commit()?;
    info!(players = report.inserted, duplicates = report.rejected, "seeded players");
    store.table(PLAYER)?.dump_formatted(None)
}
