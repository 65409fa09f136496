#[cfg(feature = "sqlite")]
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(any(feature = "postgres", feature = "sqlite"))]
use bb8::PooledConnection;

use super::types::MiddlewarePool;
use crate::error::DbIoError;
use crate::executor::StatementExecutor;
use crate::formatter::LiteralStyle;
#[cfg(feature = "postgres")]
use crate::postgres::{self, PgManager};
use crate::results::ResultSet;
#[cfg(feature = "sqlite")]
use crate::sqlite::{self, SqliteManager};
use crate::types::DatabaseType;

/// A connection checked out of a [`MiddlewarePool`].
pub enum MiddlewarePoolConnection {
    #[cfg(feature = "postgres")]
    Postgres(PooledConnection<'static, PgManager>),
    #[cfg(feature = "sqlite")]
    Sqlite(PooledConnection<'static, SqliteManager>),
}

impl std::fmt::Debug for MiddlewarePoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => f.debug_tuple("Postgres").field(&"<Client>").finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => f.debug_tuple("Sqlite").field(&"<Connection>").finish(),
        }
    }
}

impl MiddlewarePool {
    /// Get a connection from the pool
    ///
    /// # Errors
    /// Returns `DbIoError::PoolErrorPostgres` or `DbIoError::PoolErrorSqlite` if the pool fails
    /// to provide a connection.
    pub async fn get_connection(&self) -> Result<MiddlewarePoolConnection, DbIoError> {
        match self {
            #[cfg(feature = "postgres")]
            MiddlewarePool::Postgres(pool) => {
                Ok(MiddlewarePoolConnection::Postgres(pool.get_owned().await?))
            }
            #[cfg(feature = "sqlite")]
            MiddlewarePool::Sqlite(pool) => {
                Ok(MiddlewarePoolConnection::Sqlite(pool.get_owned().await?))
            }
        }
    }
}

impl MiddlewarePoolConnection {
    #[must_use]
    pub fn db_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// Executes a batch of SQL statements by delegating to the specific database module.
    ///
    /// # Errors
    /// Returns an error if the database responds with an error.
    pub async fn execute_batch(&mut self, query: &str) -> Result<(), DbIoError> {
        tracing::debug!(statement = query, "execute batch");
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => postgres::execute_batch(client, query).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => {
                sqlite::execute_batch(Arc::clone(&**conn), query.to_string()).await
            }
        }
    }

    /// Run a SELECT and collect every row.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn select(&mut self, query: &str) -> Result<ResultSet, DbIoError> {
        tracing::debug!(statement = query, "select");
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => postgres::execute_select(client, query).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => {
                sqlite::execute_select(Arc::clone(&**conn), query.to_string()).await
            }
        }
    }

    /// Run a statement that returns no rows and report how many rows it changed.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn execute(&mut self, query: &str) -> Result<usize, DbIoError> {
        tracing::debug!(statement = query, "execute");
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(client) => postgres::execute_statement(client, query).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(conn) => {
                sqlite::execute_statement(Arc::clone(&**conn), query.to_string()).await
            }
        }
    }
}

#[async_trait]
impl StatementExecutor for MiddlewarePoolConnection {
    fn literal_style(&self) -> LiteralStyle {
        self.db_type().literal_style()
    }

    async fn execute_statement(&mut self, statement: &str) -> Result<usize, DbIoError> {
        self.execute(statement).await
    }
}
