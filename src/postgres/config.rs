use std::future::Future;

use bb8::{ManageConnection, Pool};
use tokio_postgres::{Client, NoTls};

use crate::config::ConnectOptions;
use crate::error::DbIoError;
use crate::pool::MiddlewarePool;

/// Database to connect to when the session's own database may not exist yet.
pub(crate) const MAINTENANCE_DATABASE: &str = "postgres";

/// bb8 manager for Postgres clients.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` if the server rejects the credentials or cannot be
    /// reached.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<PgManager>, DbIoError> {
        Pool::builder()
            .max_size(max_size)
            .build(self)
            .await
            .map_err(|e| DbIoError::ConnectionError(format!("postgres pool error: {e}")))
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            tracing::debug!(
                hosts = ?cfg.get_hosts(),
                db = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                "postgres connect start"
            );
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection closed with error");
                }
            });
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// Translate session options into a driver config for `database`.
#[must_use]
pub fn pg_config(opts: &ConnectOptions, database: &str) -> tokio_postgres::Config {
    let mut cfg = tokio_postgres::Config::new();
    cfg.host(opts.host_or_default())
        .port(opts.port_or_default())
        .user(&opts.user)
        .application_name("sql-dbio");
    if !opts.password.is_empty() {
        cfg.password(&opts.password);
    }
    if !database.is_empty() {
        cfg.dbname(database);
    }
    cfg
}

/// Build the pool for a Postgres session.
///
/// # Errors
/// Returns `DbIoError::ConfigError` when no user is set, or `DbIoError::ConnectionError` when
/// the server cannot be reached.
pub async fn build_pool(opts: &ConnectOptions, database: &str) -> Result<MiddlewarePool, DbIoError> {
    if opts.user.trim().is_empty() {
        return Err(DbIoError::ConfigError("user is required".to_string()));
    }
    let pool = PgManager::new(pg_config(opts, database))
        .build_pool(opts.max_connections)
        .await?;
    Ok(MiddlewarePool::Postgres(pool))
}
