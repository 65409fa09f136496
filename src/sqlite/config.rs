use std::future::Future;
use std::sync::Arc;

use bb8::{ManageConnection, Pool};
use rusqlite::Connection;
use rusqlite::ffi;
use tokio::sync::Mutex;

use crate::config::ConnectOptions;
use crate::error::DbIoError;
use crate::pool::MiddlewarePool;

/// A pooled `SQLite` connection; statements lock it from a blocking thread.
pub type SharedSqliteConnection = Arc<Mutex<Connection>>;

fn join_failure(code: i32, e: &tokio::task::JoinError) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        ffi::Error::new(code),
        Some(format!("sqlite spawn_blocking join error: {e}")),
    )
}

/// bb8 manager for `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    pub(crate) path: String,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Build a single-connection pool; `SQLite` takes one writer at a time.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` if the database file cannot be opened.
    pub async fn build_pool(self) -> Result<Pool<SqliteManager>, DbIoError> {
        let path = self.path.clone();
        Pool::builder()
            .max_size(1)
            .build(self)
            .await
            .map_err(|e| DbIoError::ConnectionError(format!("sqlite pool error for {path}: {e}")))
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.path.clone();
        async move {
            tracing::debug!(%path, "opening sqlite database");
            let conn = tokio::task::spawn_blocking(move || {
                let conn = Connection::open(&path)?;
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                Ok::<_, rusqlite::Error>(conn)
            })
            .await
            .map_err(|e| join_failure(ffi::SQLITE_CANTOPEN, &e))??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            tokio::task::spawn_blocking(move || {
                handle.blocking_lock().query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
            .map_err(|e| join_failure(ffi::SQLITE_ERROR, &e))?
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Open the pool for a `SQLite` session and run a smoke test.
///
/// # Errors
/// Returns `DbIoError::ConnectionError` if the file cannot be opened.
pub async fn build_pool(opts: &ConnectOptions) -> Result<MiddlewarePool, DbIoError> {
    if opts.database.trim().is_empty() {
        return Err(DbIoError::ConfigError(
            "sqlite database path is required".to_string(),
        ));
    }
    let pool = SqliteManager::new(opts.database.clone()).build_pool().await?;
    Ok(MiddlewarePool::Sqlite(pool))
}
