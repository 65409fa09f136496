use async_trait::async_trait;

use crate::error::DbIoError;
use crate::formatter::LiteralStyle;

/// Anything that can run one generated statement at a time.
///
/// The chunked uploader only needs this much of a connection, which keeps it testable
/// without a live database.
#[async_trait]
pub trait StatementExecutor: Send {
    /// How string literals must be written for this engine.
    fn literal_style(&self) -> LiteralStyle;

    /// Prepare and run `statement`, returning the number of rows it changed.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` when the statement is rejected before running and
    /// `DbIoError::ExecutionError` when it fails while running.
    async fn execute_statement(&mut self, statement: &str) -> Result<usize, DbIoError>;
}
