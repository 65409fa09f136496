use tokio_postgres::Client;
use tokio_postgres::error::SqlState;

use crate::error::DbIoError;
use crate::results::ResultSet;

use super::query::build_result_set_from_messages;

/// SQLSTATE class 42 covers syntax errors and references to missing tables or columns.
fn is_statement_state(state: &SqlState) -> bool {
    state.code().starts_with("42")
}

/// Sort a driver error into a statement error (the text was rejected) or an execution error.
fn classify(query: &str, err: tokio_postgres::Error) -> DbIoError {
    if err.code().is_some_and(is_statement_state) {
        DbIoError::statement(query, err)
    } else {
        DbIoError::execution(query, err)
    }
}

/// Execute a batch of SQL statements for Postgres.
///
/// # Errors
/// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError` if any statement fails.
pub async fn execute_batch(client: &Client, query: &str) -> Result<(), DbIoError> {
    client
        .batch_execute(query)
        .await
        .map_err(|e| classify(query, e))
}

/// Prepare and run one statement, returning the number of rows changed.
///
/// # Errors
/// Returns `DbIoError::StatementError` when the server rejects the text and
/// `DbIoError::ExecutionError` when running it fails.
pub async fn execute_statement(client: &Client, query: &str) -> Result<usize, DbIoError> {
    let stmt = client
        .prepare(query)
        .await
        .map_err(|e| DbIoError::statement(query, e))?;
    let rows = client
        .execute(&stmt, &[])
        .await
        .map_err(|e| DbIoError::execution(query, e))?;
    Ok(usize::try_from(rows).unwrap_or(usize::MAX))
}

/// Execute a SELECT over the simple-query protocol so every column arrives as text.
///
/// # Errors
/// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
pub async fn execute_select(client: &Client, query: &str) -> Result<ResultSet, DbIoError> {
    let messages = client
        .simple_query(query)
        .await
        .map_err(|e| classify(query, e))?;
    Ok(build_result_set_from_messages(&messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_and_missing_objects_are_statement_errors() {
        assert!(is_statement_state(&SqlState::SYNTAX_ERROR));
        assert!(is_statement_state(&SqlState::UNDEFINED_TABLE));
        assert!(is_statement_state(&SqlState::UNDEFINED_COLUMN));
        assert!(!is_statement_state(&SqlState::UNIQUE_VIOLATION));
        assert!(!is_statement_state(&SqlState::CHECK_VIOLATION));
    }
}
