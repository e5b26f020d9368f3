use sqlite_tables::{
    record, roster, ColumnDefinition, Record, Registration, Result, StoreConfig, StoreError,
    StoreManager, TableDefinition, Value,
};
use rusqlite::ErrorCode;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

// Helper function to create a temporary file-based store config
fn temp_store() -> (StoreConfig, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let config = StoreConfig::new(temp_file.path()).with_busy_timeout(1_000);
    (config, temp_file)
}

// Register the school/person pair and fill the school table
fn seed_schools(store: &mut StoreManager) -> Result<()> {
    store.register_schema(&roster::schema())?;
    store.table("school")?.seed(&roster::schools())?;
    Ok(())
}

#[tokio::test]
async fn test_idempotent_registration_on_populated_store() {
    test_idempotent_registration_on_populated_store_impl().unwrap();
}

fn test_idempotent_registration_on_populated_store_impl() -> Result<()> {
    let (config, _file) = temp_store();

    let mut store = StoreManager::open(&config)?;
    assert_eq!(
        store.register_table(roster::school_table())?,
        Registration::Created
    );
    store.table("school")?.seed(&roster::schools())?;
    store.close()?;

    let mut store = StoreManager::open(&config)?;
    assert!(store.schema().contains("school"));
    assert_eq!(
        store.register_table(roster::school_table())?,
        Registration::AlreadyExists
    );
    assert_eq!(
        store.register_table(roster::school_table())?,
        Registration::AlreadyExists
    );
    assert_eq!(store.schema().table_names().filter(|name| *name == "school").count(), 1);
    assert_eq!(store.table("school")?.scan_all()?.len(), 3);
    store.close()
}

#[tokio::test]
async fn test_round_trip_after_reopen() {
    test_round_trip_after_reopen_impl().unwrap();
}

fn test_round_trip_after_reopen_impl() -> Result<()> {
    let (config, _file) = temp_store();
    let people = roster::persons();

    StoreManager::scoped(&config, |store| -> Result<()> {
        store.register_schema(&roster::schema())?;
        let person = store.table("person")?;
        for record in &people {
            person.insert(record)?;
        }
        store.commit()
    })?;

    let rows = StoreManager::scoped(&config, |store| {
        store.register_table(roster::person_table())?;
        store.table("person")?.scan_all()
    })?;

    assert_eq!(rows.len(), people.len());
    for (row, inserted) in rows.iter().zip(&people) {
        // id is engine-assigned, the rest must match column for column
        assert!(matches!(row.get(0), Some(Value::Integer(_))));
        assert_eq!(&row.values()[1..], inserted.values());
    }
    Ok(())
}

#[tokio::test]
async fn test_lookup_join_renders_school_names() {
    test_lookup_join_renders_school_names_impl().unwrap();
}

fn test_lookup_join_renders_school_names_impl() -> Result<()> {
    let mut store = StoreManager::open_in_memory()?;
    seed_schools(&mut store)?;
    store.table("person")?.seed(&roster::persons())?;
    store.commit()?;

    let lookup = store.table("school")?.to_lookup_map()?;
    assert_eq!(lookup.len(), 3);
    assert_eq!(lookup.get(2), Some("W-L HS"));

    let lines = store.table("person")?.dump_formatted(Some(&lookup))?;
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("lname=Miller fname=Eric age=55 school=Lehigh"));
    assert!(lines[2].contains("school=Williams"));
    Ok(())
}

#[tokio::test]
async fn test_missing_lookup_key_fails() {
    let mut store = StoreManager::open_in_memory().unwrap();
    seed_schools(&mut store).unwrap();
    // No referential check on insert
    store
        .table("person")
        .unwrap()
        .insert(&record!["Doe", "Jane", 40, 99])
        .unwrap();

    let lookup = store.table("school").unwrap().to_lookup_map().unwrap();
    let err = store
        .table("person")
        .unwrap()
        .dump_formatted(Some(&lookup))
        .unwrap_err();
    match err {
        StoreError::MissingLookupKey { table, lookup, key } => {
            assert_eq!(table, "person");
            assert_eq!(lookup, "school");
            assert_eq!(key, Value::Integer(99));
        }
        other => panic!("expected MissingLookupKey, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_school_does_not_abort_batch() {
    test_duplicate_school_does_not_abort_batch_impl().unwrap();
}

fn test_duplicate_school_does_not_abort_batch_impl() -> Result<()> {
    let mut store = StoreManager::open_in_memory()?;
    store.register_table(roster::school_table())?;
    let school = store.table("school")?;

    let err = {
        school.insert(&record![1, "Lehigh"])?;
        school.insert(&record![1, "Lafayette"]).unwrap_err()
    };
    assert!(err.is_duplicate_key(), "{err}");
    assert!(matches!(err, StoreError::ConstraintViolation { ref table, .. } if table == "school"));

    let report = school.seed(&[record![1, "Lafayette"], record![2, "W-L HS"]])?;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejected, 1);
    store.commit()?;

    let lookup = store.table("school")?.to_lookup_map()?;
    assert_eq!(lookup.get(1), Some("Lehigh"));
    assert_eq!(lookup.get(2), Some("W-L HS"));
    Ok(())
}

#[tokio::test]
async fn test_seed_propagates_other_failures() {
    let mut store = StoreManager::open_in_memory().unwrap();
    store.register_table(roster::school_table()).unwrap();
    let err = store
        .table("school")
        .unwrap()
        .seed(&[record![1, "Lehigh"], record![2, 3.5]])
        .unwrap_err();
    assert!(matches!(err, StoreError::UnsupportedType { type_name: "real" }));
}

#[tokio::test]
async fn test_lookup_map_requires_two_columns() {
    let mut store = StoreManager::open_in_memory().unwrap();
    store.register_table(roster::person_table()).unwrap();
    let err = store.table("person").unwrap().to_lookup_map().unwrap_err();
    assert!(matches!(err, StoreError::SchemaMismatch { ref table, .. } if table == "person"));
}

#[tokio::test]
async fn test_record_arity_is_checked() {
    let mut store = StoreManager::open_in_memory().unwrap();
    store.register_table(roster::person_table()).unwrap();
    let err = store
        .table("person")
        .unwrap()
        .insert(&record!["Miller", "Eric", 55])
        .unwrap_err();
    assert!(matches!(err, StoreError::SchemaMismatch { .. }));
}

#[tokio::test]
async fn test_existing_table_with_other_columns_is_a_mismatch() {
    let mut store = StoreManager::open_in_memory().unwrap();
    store.register_table(roster::school_table()).unwrap();
    let conflicting = TableDefinition::new("school")
        .with_column(ColumnDefinition::integer("id").primary_key())
        .with_column(ColumnDefinition::text("city"));
    let err = store.register_table(conflicting).unwrap_err();
    assert!(matches!(err, StoreError::SchemaMismatch { .. }));
}

#[tokio::test]
async fn test_open_fails_for_unusable_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("missing").join("store.db"));
    let err = StoreManager::open(&config).err().unwrap();
    assert!(matches!(err, StoreError::Open { .. }), "{err}");
}

#[tokio::test]
async fn test_transient_store_is_discarded_on_close() {
    let mut store = StoreManager::open_in_memory().unwrap();
    seed_schools(&mut store).unwrap();
    store.close().unwrap();

    let mut store = StoreManager::open_in_memory().unwrap();
    assert!(store.schema().is_empty());
    assert_eq!(
        store.register_table(roster::school_table()).unwrap(),
        Registration::Created
    );
}

#[tokio::test]
async fn test_drop_commits_pending_writes() {
    let (config, _file) = temp_store();
    {
        let mut store = StoreManager::open(&config).unwrap();
        seed_schools(&mut store).unwrap();
        // dropped without commit or close
    }
    let mut store = StoreManager::open(&config).unwrap();
    store.register_table(roster::school_table()).unwrap();
    let rows: Vec<Record> = store.table("school").unwrap().scan_all().unwrap();
    assert_eq!(rows[0], record![1, "Lehigh"]);
}

#[tokio::test]
async fn test_scoped_commits_when_closure_fails() {
    let (config, _file) = temp_store();
    let result: Result<()> = StoreManager::scoped(&config, |store| {
        seed_schools(store)?;
        store.table("nowhere").map(|_| ())
    });
    assert!(matches!(result, Err(StoreError::UnknownTable { .. })));

    let rows = StoreManager::scoped(&config, |store| {
        store.register_table(roster::school_table())?;
        store.table("school")?.scan_all()
    })
    .unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_foreign_keys_enforced_when_enabled() {
    test_foreign_keys_enforced_when_enabled_impl().unwrap();
}

fn test_foreign_keys_enforced_when_enabled_impl() -> Result<()> {
    let config = StoreConfig::in_memory().with_foreign_keys(true);
    let mut store = StoreManager::open(&config)?;
    seed_schools(&mut store)?;
    let person = store.table("person")?;

    person.insert(&record!["Miller", "Eric", 55, 1])?;
    let err = person.insert(&record!["Doe", "Jane", 40, 99]).unwrap_err();
    assert!(
        matches!(err, StoreError::ConstraintViolation { duplicate_key: false, ref table, .. } if table == "person"),
        "{err}"
    );
    assert!(!err.is_duplicate_key());

    store.commit()?;
    assert_eq!(store.table("person")?.scan_all()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_locked_store_fails_after_busy_timeout() {
    test_locked_store_fails_after_busy_timeout_impl().unwrap();
}

fn test_locked_store_fails_after_busy_timeout_impl() -> Result<()> {
    let temp_file = NamedTempFile::new().unwrap();
    let config = StoreConfig::new(temp_file.path()).with_busy_timeout(100);

    let mut writer = StoreManager::open(&config)?;
    writer.register_table(roster::school_table())?;
    writer.commit()?;
    // left uncommitted so the writer keeps its lock
    writer.table("school")?.insert(&record![1, "Lehigh"])?;

    let mut blocked = StoreManager::open(&config)?;
    assert_eq!(
        blocked.register_table(roster::school_table())?,
        Registration::AlreadyExists
    );
    let started = Instant::now();
    let err = blocked
        .table("school")?
        .insert(&record![2, "W-L HS"])
        .unwrap_err();
    let waited = started.elapsed();

    match &err {
        StoreError::Database {
            source: rusqlite::Error::SqliteFailure(failure, _),
            ..
        } => assert_eq!(failure.code, ErrorCode::DatabaseBusy),
        other => panic!("expected a busy database error, got {other:?}"),
    }
    assert!(waited >= Duration::from_millis(50), "gave up after {waited:?}");
    assert!(waited < Duration::from_secs(5), "waited {waited:?}");

    blocked.close()?;
    writer.close()?;

    let rows = StoreManager::scoped(&config, |store| {
        store.register_table(roster::school_table())?;
        store.table("school")?.scan_all()
    })?;
    assert_eq!(rows, vec![record![1, "Lehigh"]]);
    Ok(())
}
