//! Chunked bulk inserts.

use serde::Serialize;

use crate::chunking::plan_chunks;
use crate::config::{UploadOptions, UploadProgress};
use crate::error::{DbIoError, UploadError};
use crate::executor::StatementExecutor;
use crate::formatter::{ValidationReport, format_slice};
use crate::session::DbIo;
use crate::types::{Row, RowSet};

/// Outcome of a completed upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub table: String,
    pub rows_uploaded: usize,
    pub statements: usize,
    pub report: ValidationReport,
}

/// `INSERT INTO <table> (<columns>) VALUES <literal>;`
#[must_use]
pub fn insert_statement(table: &str, columns: &str, literal: &str) -> String {
    format!("INSERT INTO {table} ({columns}) VALUES {literal};")
}

fn check_widths(table: &str, rows: &[Row], expected: usize) -> Result<(), DbIoError> {
    let mut mismatched = rows.iter().enumerate().filter(|(_, row)| row.len() != expected);
    if let Some((first_index, _)) = mismatched.next() {
        return Err(DbIoError::RowWidthMismatch {
            table: table.to_string(),
            expected,
            mismatched: 1 + mismatched.count(),
            first_index,
        });
    }
    Ok(())
}

/// Insert `rows` into `table` one chunk at a time through `executor`.
///
/// Every row must have `expected_width` fields. Chunks run strictly in order and the first
/// failure stops the upload; rows from earlier chunks stay committed and are reported in the
/// returned [`UploadError`].
///
/// # Errors
/// Returns `DbIoError::RowWidthMismatch` before any statement runs, `DbIoError::Upload` when a
/// chunk fails, or `DbIoError::Cancelled` when the cancel token fires between chunks.
pub async fn upload_chunks<E>(
    executor: &mut E,
    table: &str,
    columns: &str,
    expected_width: usize,
    rows: RowSet,
    options: &UploadOptions,
) -> Result<UploadSummary, DbIoError>
where
    E: StatementExecutor + ?Sized,
{
    let rows = rows.into_positional();
    let mut summary = UploadSummary {
        table: table.to_string(),
        ..UploadSummary::default()
    };
    if rows.is_empty() {
        return Ok(summary);
    }
    check_widths(table, &rows, expected_width)?;

    let style = executor.literal_style();
    let total_rows = rows.len();
    let ranges = plan_chunks(&rows, options.safety_factor, options.payload_ceiling);
    tracing::debug!(table, total_rows, chunks = ranges.len(), "planned upload");

    for range in ranges {
        if options.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            tracing::warn!(table, committed = summary.rows_uploaded, "upload cancelled");
            return Err(DbIoError::Cancelled {
                table: table.to_string(),
                committed_rows: summary.rows_uploaded,
            });
        }

        let formatted = format_slice(&rows[range.clone()], style);
        let statement = insert_statement(table, columns, &formatted.literal);
        if let Err(err) = executor.execute_statement(&statement).await {
            tracing::error!(
                table,
                start = range.start,
                end = range.end,
                error = %err,
                "chunk failed; aborting upload"
            );
            return Err(UploadError {
                table: table.to_string(),
                failed_rows: range,
                committed_rows: summary.rows_uploaded,
                source: Box::new(err),
            }
            .into());
        }

        summary.rows_uploaded = range.end;
        summary.statements += 1;
        summary.report.merge(formatted.report, range.start);
        tracing::info!("uploaded rows {}..{} of {} to {}", range.start, range.end, total_rows, table);
        if let Some(callback) = &options.on_progress {
            callback(UploadProgress {
                rows_done: range.end,
                total_rows,
            });
        }
    }

    if !summary.report.downgraded.is_empty() {
        tracing::warn!(
            table,
            downgraded = summary.report.downgraded_count(),
            "fields replaced with NA during upload"
        );
    }
    Ok(summary)
}

impl DbIo {
    /// Insert a literal fragment that was already formatted for this backend.
    ///
    /// Returns the number of rows the database reports as inserted; an empty fragment issues
    /// no statement.
    ///
    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded`, `DbIoError::StatementError` or
    /// `DbIoError::ExecutionError`.
    pub async fn insert_literal(&self, table: &str, literal: &str, count: usize) -> Result<usize, DbIoError> {
        let columns = self.schema()?.column_list(table)?;
        if count == 0 || literal.is_empty() {
            return Ok(0);
        }
        let mut conn = self.get_connection().await?;
        let inserted = conn
            .execute_statement(&insert_statement(table, &columns, literal))
            .await?;
        tracing::info!("uploaded {count} rows to {table}");
        Ok(inserted)
    }

    /// Upload `rows` to `table` with the default payload ceiling.
    ///
    /// # Errors
    /// See [`DbIo::upload_rows_with`].
    pub async fn upload_rows(&self, table: &str, rows: impl Into<RowSet>) -> Result<UploadSummary, DbIoError> {
        self.upload_rows_with(table, rows, &UploadOptions::default()).await
    }

    /// Upload `rows` to `table`, splitting into as many `INSERT`s as the payload ceiling needs.
    ///
    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded` before touching the database when the table has no
    /// columns in the session schema, `DbIoError::RowWidthMismatch` when any row has the wrong
    /// number of fields, and `DbIoError::Upload` when a chunk fails.
    pub async fn upload_rows_with(
        &self,
        table: &str,
        rows: impl Into<RowSet>,
        options: &UploadOptions,
    ) -> Result<UploadSummary, DbIoError> {
        let schema = self.schema()?;
        let columns = schema.column_list(table)?;
        let width = schema.column_count(table)?;
        let rows = rows.into();
        if rows.is_empty() {
            return Ok(UploadSummary {
                table: table.to_string(),
                ..UploadSummary::default()
            });
        }
        let mut conn = self.get_connection().await?;
        upload_chunks(&mut conn, table, &columns, width, rows, options).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::formatter::LiteralStyle;

    /// Records statements and fails the call numbered `fail_on`.
    struct Recorder {
        statements: Vec<String>,
        fail_on: Option<usize>,
    }

    impl Recorder {
        fn new(fail_on: Option<usize>) -> Self {
            Self {
                statements: Vec::new(),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl StatementExecutor for Recorder {
        fn literal_style(&self) -> LiteralStyle {
            LiteralStyle::Backslash
        }

        async fn execute_statement(&mut self, statement: &str) -> Result<usize, DbIoError> {
            let call = self.statements.len();
            self.statements.push(statement.to_string());
            if self.fail_on == Some(call) {
                return Err(DbIoError::ExecutionError {
                    statement: statement.to_string(),
                    source: Box::new(DbIoError::ConnectionError("server went away".into())),
                });
            }
            Ok(statement.matches("),(").count() + 1)
        }
    }

    fn animals() -> RowSet {
        RowSet::from_rows([
            ["1", "Weasel", "15"],
            ["2", "stoat", "9"],
            ["3", "egret", "na"],
            ["4", "black_footed_ferret", "20"],
        ])
    }

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(fut)
    }

    #[test]
    fn single_statement_when_under_ceiling() -> Result<(), DbIoError> {
        let mut rec = Recorder::new(None);
        let summary = run(upload_chunks(
            &mut rec,
            "Animals",
            "ID,Name,Age",
            3,
            animals(),
            &UploadOptions::default(),
        ))?;
        assert_eq!(
            rec.statements,
            vec![
                r"INSERT INTO Animals (ID,Name,Age) VALUES ('1','Weasel','15'),('2','stoat','9'),('3','egret','NA'),('4','black\_footed\_ferret','20');"
                    .to_string()
            ]
        );
        assert_eq!(summary.rows_uploaded, 4);
        assert_eq!(summary.statements, 1);
        assert_eq!(summary.report.normalized_na, 1);
        Ok(())
    }

    #[test]
    fn splits_and_reports_progress() -> Result<(), DbIoError> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        // 46 field bytes * 8 = 368 against a 250 byte ceiling -> divisor 2, two rows per chunk.
        let options = UploadOptions::default()
            .payload_ceiling(250)
            .on_progress(move |p| sink.lock().expect("progress lock").push(p.rows_done));
        let mut rec = Recorder::new(None);
        let summary = run(upload_chunks(&mut rec, "Animals", "ID,Name,Age", 3, animals(), &options))?;
        assert_eq!(rec.statements.len(), 2);
        assert!(rec.statements[1].contains("('3','egret','NA')"));
        assert_eq!(summary.statements, 2);
        assert_eq!(*seen.lock().expect("progress lock"), vec![2, 4]);
        Ok(())
    }

    #[test]
    fn second_chunk_failure_stops_the_upload() {
        let options = UploadOptions::default().payload_ceiling(250);
        let mut rec = Recorder::new(Some(1));
        let err = run(upload_chunks(&mut rec, "Animals", "ID,Name,Age", 3, animals(), &options))
            .unwrap_err();
        match err {
            DbIoError::Upload(upload) => {
                assert_eq!(upload.failed_rows, 2..4);
                assert_eq!(upload.committed_rows, 2);
                assert!(!upload.is_statement_error());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(rec.statements.len(), 2);
    }

    #[test]
    fn empty_upload_issues_nothing() -> Result<(), DbIoError> {
        let mut rec = Recorder::new(Some(0));
        let summary = run(upload_chunks(
            &mut rec,
            "Animals",
            "ID,Name,Age",
            3,
            RowSet::Positional(Vec::new()),
            &UploadOptions::default(),
        ))?;
        assert!(rec.statements.is_empty());
        assert_eq!(summary.rows_uploaded, 0);
        Ok(())
    }

    #[test]
    fn mismatched_rows_are_counted_not_dropped() {
        let rows = RowSet::from_rows(vec![vec!["1", "Lion", "12"], vec!["Leopard", "5"], vec!["3"]]);
        let mut rec = Recorder::new(None);
        let err = run(upload_chunks(
            &mut rec,
            "Animals",
            "ID,Name,Age",
            3,
            rows,
            &UploadOptions::default(),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            DbIoError::RowWidthMismatch {
                expected: 3,
                mismatched: 2,
                first_index: 1,
                ..
            }
        ));
        assert!(rec.statements.is_empty());
    }

    #[test]
    fn cancellation_takes_effect_between_chunks() {
        let token = CancellationToken::new();
        token.cancel();
        let options = UploadOptions::default().cancel_token(token);
        let mut rec = Recorder::new(None);
        let err = run(upload_chunks(&mut rec, "Animals", "ID,Name,Age", 3, animals(), &options))
            .unwrap_err();
        assert!(matches!(err, DbIoError::Cancelled { committed_rows: 0, .. }));
        assert!(rec.statements.is_empty());
    }
}
