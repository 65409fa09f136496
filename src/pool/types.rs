#[cfg(any(feature = "postgres", feature = "sqlite"))]
use bb8::Pool;

#[cfg(feature = "postgres")]
use crate::postgres::PgManager;
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteManager;

use crate::types::DatabaseType;

/// Connection pool for database access
///
/// This enum wraps the different connection pool types for the
/// supported database engines.
#[derive(Clone)]
pub enum MiddlewarePool {
    /// `PostgreSQL` connection pool
    #[cfg(feature = "postgres")]
    Postgres(Pool<PgManager>),
    /// `SQLite` connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(Pool<SqliteManager>),
}

// Manual Debug implementation because the bb8 managers do not expose `Debug`
impl std::fmt::Debug for MiddlewarePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => f
                .debug_tuple("Postgres")
                .field(&pool.state().connections)
                .finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => f
                .debug_tuple("Sqlite")
                .field(&pool.state().connections)
                .finish(),
        }
    }
}

impl MiddlewarePool {
    #[must_use]
    pub fn db_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => DatabaseType::Sqlite,
        }
    }
}
