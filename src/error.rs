use std::ops::Range;

use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "postgres")]
use tokio_postgres;

#[derive(Debug, Error)]
pub enum DbIoError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    PoolErrorSqlite(#[from] bb8::RunError<rusqlite::Error>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// No column schema is installed, or the installed one has no entry for the table.
    #[error("{}", schema_message(.table.as_deref()))]
    SchemaNotLoaded { table: Option<String> },

    /// The driver refused to prepare the generated statement.
    #[error("could not prepare statement `{statement}`: {source}")]
    StatementError {
        statement: String,
        #[source]
        source: Box<DbIoError>,
    },

    /// The statement was accepted but failed while running.
    #[error("failed to execute `{statement}`: {source}")]
    ExecutionError {
        statement: String,
        #[source]
        source: Box<DbIoError>,
    },

    #[error(
        "{mismatched} row(s) for {table} do not have {expected} fields (first at index {first_index})"
    )]
    RowWidthMismatch {
        table: String,
        expected: usize,
        mismatched: usize,
        first_index: usize,
    },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("upload to {table} cancelled after {committed_rows} committed rows")]
    Cancelled { table: String, committed_rows: usize },

    #[error("Value conversion error: {0}")]
    ConversionError(String),

    #[error("Backup error: {0}")]
    BackupError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn schema_message(table: Option<&str>) -> String {
    match table {
        Some(table) => format!("no columns loaded for table {table}"),
        None => "column schema has not been loaded for this session".to_string(),
    }
}

/// A chunked upload stopped part-way through.
///
/// Chunks before `failed_rows` were committed and stay in the table.
#[derive(Debug, Error)]
#[error("upload to {table} failed on rows {}..{} ({committed_rows} rows already committed): {source}", .failed_rows.start, .failed_rows.end)]
pub struct UploadError {
    pub table: String,
    pub failed_rows: Range<usize>,
    pub committed_rows: usize,
    #[source]
    pub source: Box<DbIoError>,
}

impl UploadError {
    /// True when the driver rejected the statement text rather than its execution.
    #[must_use]
    pub fn is_statement_error(&self) -> bool {
        matches!(*self.source, DbIoError::StatementError { .. })
    }
}

impl DbIoError {
    pub(crate) fn statement(statement: &str, source: impl Into<DbIoError>) -> Self {
        DbIoError::StatementError {
            statement: statement.to_string(),
            source: Box::new(source.into()),
        }
    }

    pub(crate) fn execution(statement: &str, source: impl Into<DbIoError>) -> Self {
        DbIoError::ExecutionError {
            statement: statement.to_string(),
            source: Box::new(source.into()),
        }
    }
}
