#![cfg(feature = "sqlite")]
use std::sync::{Arc, Mutex};

use sql_dbio::prelude::*;
use tempfile::TempDir;
use tokio::runtime::Runtime;

const SCHEMA: &str = "\
# Animals
ID INTEGER PRIMARY KEY
Name TEXT
Age INTEGER
";

fn open(dir: &TempDir, rt: &Runtime) -> Result<DbIo, DbIoError> {
    let path = dir.path().join("zoo.db");
    let options = ConnectOptions::sqlite_builder(path.to_string_lossy()).finish();
    rt.block_on(async {
        let db = DbIo::connect(options).await?;
        db.set_schema(ColumnSchema::parse(SCHEMA)?)?;
        db.new_tables(db.schema()?).await?;
        Ok(db)
    })
}

#[test]
fn uploaded_text_reads_back_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db = open(&dir, &rt)?;

    let rows = RowSet::from_rows([
        ["1", "weasel: 'Fred'", "15"],
        ["2", "black_footed_ferret", "9"],
        ["3", "egret", "n/a"],
        ["4", r#"badger\ "Reggie""#, "3"],
    ]);
    let summary = rt.block_on(db.upload_rows("Animals", rows))?;
    assert_eq!(summary.rows_uploaded, 4);
    assert_eq!(summary.statements, 1);
    assert_eq!(summary.report.normalized_na, 1);

    let table = rt.block_on(db.get_table("Animals"))?;
    assert_eq!(
        table,
        vec![
            vec!["1", "weasel: 'Fred'", "15"],
            vec!["2", "black_footed_ferret", "9"],
            vec!["3", "egret", "NA"],
            vec!["4", r#"badger- "Reggie""#, "3"],
        ]
    );
    Ok(())
}

#[test]
fn failing_chunk_keeps_earlier_chunks() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db = open(&dir, &rt)?;

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    // A one byte ceiling forces one row per statement.
    let options = UploadOptions::default()
        .payload_ceiling(1)
        .on_progress(move |p| sink.lock().expect("progress lock").push(p.rows_done));
    let rows = RowSet::from_rows([
        ["1", "lion", "12"],
        ["2", "leopard", "5"],
        ["2", "duplicate", "1"],
        ["4", "never written", "2"],
    ]);

    let err = rt
        .block_on(db.upload_rows_with("Animals", rows, &options))
        .unwrap_err();
    match err {
        DbIoError::Upload(upload) => {
            assert_eq!(upload.table, "Animals");
            assert_eq!(upload.failed_rows, 2..3);
            assert_eq!(upload.committed_rows, 2);
            assert!(!upload.is_statement_error());
        }
        other => panic!("expected an upload error, got {other:?}"),
    }
    assert_eq!(*progress.lock().expect("progress lock"), vec![1, 2]);
    assert_eq!(rt.block_on(db.count_rows("Animals"))?, 2);
    assert_eq!(
        rt.block_on(db.get_column_text("Animals", "Name"))?,
        vec!["lion", "leopard"]
    );
    Ok(())
}

#[test]
fn missing_table_is_a_statement_error() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("zoo.db");
    let options = ConnectOptions::sqlite_builder(path.to_string_lossy()).finish();
    // Ghost is described in the session schema but was never created.
    let db = rt.block_on(async {
        let db = DbIo::connect(options).await?;
        db.set_schema(ColumnSchema::parse(&format!("{SCHEMA}\n# Ghost\nID INTEGER\n"))?)?;
        db.new_tables(&ColumnSchema::parse(SCHEMA)?).await?;
        Ok::<_, DbIoError>(db)
    })?;

    let err = rt
        .block_on(db.upload_rows("Ghost", RowSet::from_rows([["1"]])))
        .unwrap_err();
    let upload = match err {
        DbIoError::Upload(upload) => upload,
        other => panic!("expected an upload error, got {other:?}"),
    };
    assert!(upload.is_statement_error());
    assert_eq!(upload.failed_rows, 0..1);
    assert_eq!(upload.committed_rows, 0);
    match &*upload.source {
        DbIoError::StatementError { statement, .. } => {
            assert_eq!(statement, "INSERT INTO Ghost (ID) VALUES ('1');");
        }
        other => panic!("expected a statement error, got {other:?}"),
    }
    assert!(upload.to_string().contains("no such table: Ghost"));
    Ok(())
}

#[test]
fn empty_and_mismatched_uploads_write_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db = open(&dir, &rt)?;

    let summary = rt.block_on(db.upload_rows("Animals", Vec::<Row>::new()))?;
    assert_eq!(summary.rows_uploaded, 0);
    assert_eq!(summary.statements, 0);

    let ragged = RowSet::from_rows(vec![vec!["1", "lion", "12"], vec!["2", "leopard"]]);
    let err = rt.block_on(db.upload_rows("Animals", ragged)).unwrap_err();
    assert!(matches!(
        err,
        DbIoError::RowWidthMismatch {
            expected: 3,
            mismatched: 1,
            first_index: 1,
            ..
        }
    ));
    assert_eq!(rt.block_on(db.count_rows("Animals"))?, 0);
    Ok(())
}

#[test]
fn upload_without_schema_fails_fast() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bare.db");
    let db = rt.block_on(DbIo::connect(
        ConnectOptions::sqlite_builder(path.to_string_lossy()).finish(),
    ))?;

    let rows = RowSet::from_rows([["1", "lion", "12"]]);
    let err = rt.block_on(db.upload_rows("Animals", rows.clone())).unwrap_err();
    assert!(matches!(err, DbIoError::SchemaNotLoaded { table: None }));

    db.set_schema(ColumnSchema::parse(SCHEMA)?)?;
    let err = rt.block_on(db.upload_rows("Keepers", rows)).unwrap_err();
    assert!(matches!(err, DbIoError::SchemaNotLoaded { table: Some(t) } if t == "Keepers"));

    let again = db.set_schema(ColumnSchema::default()).unwrap_err();
    assert!(matches!(again, DbIoError::ConfigError(_)));
    Ok(())
}

#[test]
fn keyed_rows_upload_in_any_order() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let dir = tempfile::tempdir()?;
    let db = open(&dir, &rt)?;

    let keyed: std::collections::HashMap<String, Row> = [
        ("a".to_string(), vec!["10".to_string(), "otter".to_string(), "4".to_string()]),
        ("b".to_string(), vec!["11".to_string(), "mink".to_string(), "2".to_string()]),
    ]
    .into_iter()
    .collect();
    let summary = rt.block_on(db.upload_rows("Animals", keyed))?;
    assert_eq!(summary.rows_uploaded, 2);

    let mut names = rt.block_on(db.get_column_text("Animals", "Name"))?;
    names.sort();
    assert_eq!(names, vec!["mink", "otter"]);
    Ok(())
}
