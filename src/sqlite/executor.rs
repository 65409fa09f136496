use rusqlite::Connection;

use crate::error::DbIoError;
use crate::results::ResultSet;

use super::config::SharedSqliteConnection;
use super::query::build_result_set;

/// Run `func` against the connection on tokio's blocking pool.
///
/// # Errors
/// Returns whatever `func` returns, or `DbIoError::Io` if the blocking task panics.
pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, DbIoError>
where
    F: FnOnce(&mut Connection) -> Result<R, DbIoError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| {
        DbIoError::Io(std::io::Error::other(format!(
            "sqlite spawn_blocking join error: {e}"
        )))
    })?
}

/// Execute a batch of SQL statements for `SQLite` using auto-commit.
///
/// # Errors
///
/// Returns `DbIoError::ExecutionError` if any statement fails.
pub async fn execute_batch(conn: SharedSqliteConnection, query: String) -> Result<(), DbIoError> {
    run_blocking(conn, move |conn| {
        conn.execute_batch(&query)
            .map_err(|e| DbIoError::execution(&query, e))
    })
    .await
}

/// Prepare and run one statement, returning the number of rows changed.
///
/// # Errors
///
/// Returns `DbIoError::StatementError` when `SQLite` cannot compile the text and
/// `DbIoError::ExecutionError` when running it fails.
pub async fn execute_statement(
    conn: SharedSqliteConnection,
    query: String,
) -> Result<usize, DbIoError> {
    run_blocking(conn, move |conn| {
        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| DbIoError::statement(&query, e))?;
        stmt.execute([]).map_err(|e| DbIoError::execution(&query, e))
    })
    .await
}

/// Execute a SELECT query in `SQLite`.
///
/// # Errors
///
/// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
pub async fn execute_select(
    conn: SharedSqliteConnection,
    query: String,
) -> Result<ResultSet, DbIoError> {
    run_blocking(conn, move |conn| {
        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| DbIoError::statement(&query, e))?;
        build_result_set(&mut stmt).map_err(|e| DbIoError::execution(&query, e))
    })
    .await
}
