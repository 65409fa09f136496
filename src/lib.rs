//! Async helpers for moving rows of text in and out of SQL tables.
//!
//! A [`DbIo`] session owns a connection pool and, once loaded, the column schema that every
//! generated statement is built from. Rows are plain `Vec<String>`s: they are escaped into
//! `('a','b'),('c','d')` literals, uploaded in chunks sized against a payload ceiling, and read
//! back as text.
//!
//! ```rust,no_run
//! use sql_dbio::prelude::*;
//!
//! # async fn run() -> Result<(), DbIoError> {
//! let options = ConnectOptions::sqlite_builder("zoo.db").finish();
//! let db = DbIo::connect(options).await?;
//! db.set_schema(ColumnSchema::parse("# Animals\nID INTEGER\nName TEXT\n")?)?;
//! db.new_tables(db.schema()?).await?;
//! db.upload_rows("Animals", RowSet::from_rows([["1", "black_footed_ferret"]])).await?;
//! let _rows = db.get_table("Animals").await?;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod chunking;
pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod formatter;
pub mod pool;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod prelude;
pub mod results;
pub mod schema;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod types;
pub mod update;
pub mod upload;

pub use config::{
    ConnectOptions, ConnectOptionsBuilder, CredentialSource, StaticCredentials, StdinCredentials,
    UploadOptions, UploadProgress,
};
pub use error::{DbIoError, UploadError};
pub use executor::StatementExecutor;
pub use formatter::{
    FormattedRows, LiteralStyle, ValidationReport, add_apostrophes, column_equal_to, escape_chars,
    format_rows, format_rows_as, unescape_chars,
};
pub use pool::{MiddlewarePool, MiddlewarePoolConnection};
pub use results::{CustomDbRow, ResultSet, rows_to_text};
pub use schema::{ColumnDef, ColumnSchema};
pub use session::DbIo;
pub use types::{DatabaseType, NIL_MARKER, Row, RowSet, RowValues};
pub use upload::UploadSummary;
