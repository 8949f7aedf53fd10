use tempfile::TempDir;
use zoonotic_loader::{
    Database, Error, InsertOutcome, RecordSet, Result, SqliteConfig, Value, WriteOutcome,
};

// Helper function to create a database file inside a fresh temporary directory
fn create_temp_db() -> (Database, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::new(SqliteConfig::in_dir(dir.path().join("db"), "test.sqlite")).unwrap();
    (db, dir)
}

fn diseases() -> Result<RecordSet> {
    RecordSet::new(["codigo", "enfermedad", "localidad"])
        .with_row([Value::from(1), "Gripe Aviar".into(), "Cali".into()])?
        .with_row([Value::from(2), "Rabia".into(), "Pasto".into()])?
        .with_row([Value::from(3), "Brucelosis".into(), "Neiva".into()])
}

fn localidad_of(records: &RecordSet, codigo: i64) -> Option<Value> {
    records
        .rows_where("codigo", &Value::Integer(codigo))
        .unwrap()
        .first()
        .and_then(|row| row.get("localidad").cloned())
}

#[test]
fn test_new_creates_database_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("static").join("db");
    let db = Database::new(SqliteConfig::in_dir(&nested, "x.sqlite")).unwrap();
    assert!(nested.is_dir());
    assert_eq!(db.path(), nested.join("x.sqlite"));
}

#[test]
fn test_insert_then_read_round_trip() {
    test_insert_then_read_round_trip_impl().unwrap();
}

fn test_insert_then_read_round_trip_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    let records = diseases()?;

    let outcome = db.insert(&records, "enfermedades")?;
    assert_eq!(outcome, InsertOutcome::Replaced { rows: 3 });

    let read = db.query("enfermedades", None);
    assert_eq!(read.columns(), records.columns());
    assert_eq!(read, records);
    Ok(())
}

#[test]
fn test_empty_insert_leaves_existing_table() {
    test_empty_insert_leaves_existing_table_impl().unwrap();
}

fn test_empty_insert_leaves_existing_table_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    db.insert(&diseases()?, "enfermedades")?;

    let outcome = db.insert(&RecordSet::new(["codigo"]), "enfermedades")?;
    assert_eq!(outcome, InsertOutcome::Skipped);
    assert_eq!(db.query("enfermedades", None).len(), 3);

    // Nothing is created for a table that did not exist yet.
    db.insert(&RecordSet::default(), "otra")?;
    assert!(db.try_query("otra", None).is_err());
    Ok(())
}

#[test]
fn test_reinsert_replaces_rows_and_schema() {
    test_reinsert_replaces_rows_and_schema_impl().unwrap();
}

fn test_reinsert_replaces_rows_and_schema_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    db.insert(&diseases()?, "enfermedades")?;

    let replacement = RecordSet::new(["id", "nombre"]).with_row([Value::from(9), "Peste".into()])?;
    db.insert(&replacement, "enfermedades")?;

    let read = db.query("enfermedades", None);
    assert_eq!(read, replacement);
    Ok(())
}

#[test]
fn test_column_types_are_inferred() {
    test_column_types_are_inferred_impl().unwrap();
}

fn test_column_types_are_inferred_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    let records = RecordSet::new(["entero", "real", "texto", "vacio"])
        .with_row([Value::from(1), Value::from(1.5), "a".into(), Value::Null])?
        .with_row([Value::from(2), Value::from(2), Value::Null, Value::Null])?;
    db.insert(&records, "tipos")?;

    let types = db.try_query("tipos", Some("SELECT name, type FROM pragma_table_info('tipos')"))?;
    let declared: Vec<Value> = types.column_values("type")?.into_iter().cloned().collect();
    assert_eq!(
        declared,
        vec![
            Value::from("INTEGER"),
            Value::from("REAL"),
            Value::from("TEXT"),
            Value::from("TEXT"),
        ]
    );

    // Integers stored in a REAL column come back as reals.
    let read = db.query("tipos", None);
    assert_eq!(read.row(1).unwrap().get("real"), Some(&Value::Real(2.0)));
    assert_eq!(read.row(1).unwrap().get("texto"), Some(&Value::Null));
    Ok(())
}

#[test]
fn test_update_changes_only_matching_rows() {
    test_update_changes_only_matching_rows_impl().unwrap();
}

fn test_update_changes_only_matching_rows_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    db.insert(&diseases()?, "enfermedades")?;

    let outcome = db.update_one_column("enfermedades", "localidad", "Z", "codigo", 2)?;
    assert_eq!(outcome, WriteOutcome { rows_affected: 1 });

    let read = db.query("enfermedades", None);
    assert_eq!(localidad_of(&read, 1), Some(Value::from("Cali")));
    assert_eq!(localidad_of(&read, 2), Some(Value::from("Z")));
    assert_eq!(localidad_of(&read, 3), Some(Value::from("Neiva")));
    assert_eq!(
        read.rows_where("codigo", &Value::Integer(2))?[0].get("enfermedad"),
        Some(&Value::from("Rabia"))
    );
    Ok(())
}

#[test]
fn test_update_with_differently_cased_column() {
    test_update_with_differently_cased_column_impl().unwrap();
}

fn test_update_with_differently_cased_column_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    db.insert(&diseases()?, "enfermedades")?;

    let outcome = db.update_one_column("enfermedades", "Localidad", "Z", "CODIGO", 1)?;
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(localidad_of(&db.query("enfermedades", None), 1), Some(Value::from("Z")));

    let outcome = db.delete_one_column("enfermedades", "Codigo", 1)?;
    assert_eq!(outcome.rows_affected, 1);
    Ok(())
}

#[test]
fn test_failed_insert_keeps_previous_table() {
    test_failed_insert_keeps_previous_table_impl().unwrap();
}

fn test_failed_insert_keeps_previous_table_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    let records = diseases()?;
    db.insert(&records, "enfermedades")?;

    let clashing = RecordSet::new(["codigo", "codigo"]).with_row([Value::from(1), Value::from(2)])?;
    let err = db.insert(&clashing, "enfermedades").unwrap_err();
    assert!(matches!(err, Error::Sqlite(_)));

    assert_eq!(db.query("enfermedades", None), records);
    Ok(())
}

#[test]
fn test_update_without_match_is_not_an_error() {
    test_update_without_match_is_not_an_error_impl().unwrap();
}

fn test_update_without_match_is_not_an_error_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    let records = diseases()?;
    db.insert(&records, "enfermedades")?;

    let outcome = db.update_one_column("enfermedades", "localidad", "Z", "codigo", 99)?;
    assert!(!outcome.matched());
    assert_eq!(db.query("enfermedades", None), records);
    Ok(())
}

#[test]
fn test_delete_removes_matching_rows_and_repeat_is_noop() {
    test_delete_removes_matching_rows_and_repeat_is_noop_impl().unwrap();
}

fn test_delete_removes_matching_rows_and_repeat_is_noop_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    db.insert(&diseases()?, "enfermedades")?;

    let first = db.delete_one_column("enfermedades", "codigo", 3)?;
    assert_eq!(first.rows_affected, 1);
    let second = db.delete_one_column("enfermedades", "codigo", 3)?;
    assert_eq!(second.rows_affected, 0);

    let read = db.query("enfermedades", None);
    assert_eq!(read.len(), 2);
    assert!(!read.contains("codigo", &Value::Integer(3))?);
    Ok(())
}

#[test]
fn test_query_missing_table_returns_empty() {
    let (db, _dir) = create_temp_db();

    let read = db.query("no_existe", None);
    assert!(read.is_empty());
    assert!(read.columns().is_empty());

    let err = db.try_query("no_existe", None).unwrap_err();
    assert!(matches!(err, Error::Sqlite(_)));

    assert!(db.query("no_existe", Some("SELEC nada")).is_empty());
}

#[test]
fn test_query_with_custom_sql() {
    test_query_with_custom_sql_impl().unwrap();
}

fn test_query_with_custom_sql_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    db.insert(&diseases()?, "enfermedades")?;

    let read = db.query(
        "enfermedades",
        Some("SELECT enfermedad FROM enfermedades WHERE codigo >= 2 ORDER BY codigo"),
    );
    assert_eq!(read.columns(), ["enfermedad".to_string()]);
    assert_eq!(
        read.column_values("enfermedad")?,
        vec![&Value::from("Rabia"), &Value::from("Brucelosis")]
    );
    Ok(())
}

#[test]
fn test_unknown_identifiers_are_rejected() {
    test_unknown_identifiers_are_rejected_impl().unwrap();
}

fn test_unknown_identifiers_are_rejected_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    let records = diseases()?;
    db.insert(&records, "enfermedades")?;

    let err = db
        .update_one_column("enfermedades", "pais", "X", "codigo", 1)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "pais"));

    let err = db
        .delete_one_column("enfermedades", "codigo\" OR 1=1 --", 1)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownColumn { .. }));

    let err = db.delete_one_column("nada", "codigo", 1).unwrap_err();
    assert!(matches!(err, Error::UnknownTable(ref table) if table == "nada"));

    assert_eq!(db.query("enfermedades", None), records);
    Ok(())
}

#[test]
fn test_quoted_identifiers_round_trip() {
    test_quoted_identifiers_round_trip_impl().unwrap();
}

fn test_quoted_identifiers_round_trip_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    let records = RecordSet::new(["código \"id\"", "zona"])
        .with_row([Value::from(1), "norte".into()])?
        .with_row([Value::from(2), "sur".into()])?;
    db.insert(&records, "tabla con espacios")?;

    db.update_one_column("tabla con espacios", "zona", "este", "código \"id\"", 2)?;
    db.delete_one_column("tabla con espacios", "código \"id\"", 1)?;

    let read = db.query("tabla con espacios", None);
    assert_eq!(read.len(), 1);
    assert_eq!(read.row(0).unwrap().get("zona"), Some(&Value::from("este")));

    assert!(matches!(
        db.insert(&records, ""),
        Err(Error::InvalidIdentifier(_))
    ));
    Ok(())
}

#[test]
fn test_end_to_end_scenario() {
    test_end_to_end_scenario_impl().unwrap();
}

fn test_end_to_end_scenario_impl() -> Result<()> {
    let (db, _dir) = create_temp_db();
    db.insert(&diseases()?, "X")?;
    assert_eq!(db.query("X", None).len(), 3);

    db.update_one_column("X", "localidad", "Z", "codigo", 2)?;
    let read = db.query("X", None);
    assert_eq!(localidad_of(&read, 1), Some(Value::from("Cali")));
    assert_eq!(localidad_of(&read, 2), Some(Value::from("Z")));
    assert_eq!(localidad_of(&read, 3), Some(Value::from("Neiva")));

    db.delete_one_column("X", "codigo", 3)?;
    let read = db.query("X", None);
    let codes: Vec<&Value> = read.column_values("codigo")?;
    assert_eq!(codes, vec![&Value::Integer(1), &Value::Integer(2)]);
    Ok(())
}
