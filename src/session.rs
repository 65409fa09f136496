use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::config::{ConnectOptions, CredentialSource, StaticCredentials, StdinCredentials};
use crate::error::DbIoError;
use crate::formatter::add_apostrophes;
use crate::pool::{MiddlewarePool, MiddlewarePoolConnection};
use crate::schema::{ColumnDef, ColumnSchema};
use crate::types::DatabaseType;

/// One connected session: options, pool, and the column schema once it is loaded.
///
/// The schema can be installed exactly once and is read-only afterwards, so a session may be
/// shared across tasks behind an `Arc` without further locking.
#[derive(Debug)]
pub struct DbIo {
    options: ConnectOptions,
    pool: MiddlewarePool,
    start_time: DateTime<Local>,
    started: Instant,
    schema: OnceLock<Arc<ColumnSchema>>,
}

impl DbIo {
    /// Connect, prompting on the terminal for a missing user name or password.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` if the server rejects the credentials or cannot be
    /// reached.
    pub async fn connect(options: ConnectOptions) -> Result<Self, DbIoError> {
        Self::connect_with(options, &StdinCredentials::default()).await
    }

    /// Connect, asking `credentials` for anything the options leave blank.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` if the server rejects the credentials or cannot be
    /// reached.
    pub async fn connect_with(
        mut options: ConnectOptions,
        credentials: &dyn CredentialSource,
    ) -> Result<Self, DbIoError> {
        options.resolve_credentials(credentials)?;
        let started = Instant::now();
        let start_time = Local::now();
        let database = options.database.clone();
        let pool = build_pool(&options).await?;

        let session = Self {
            options,
            pool,
            start_time,
            started,
            schema: OnceLock::new(),
        };
        session.check_alive().await.map_err(|e| {
            DbIoError::ConnectionError(format!("cannot connect to database {database}: {e}"))
        })?;
        tracing::info!(database = %session.options.database, "connected");
        Ok(session)
    }

    /// True if the given credentials open a working connection. The connection is discarded.
    pub async fn ping(options: ConnectOptions) -> bool {
        match Self::connect(options).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "ping failed");
                false
            }
        }
    }

    /// Create `database` if it does not exist yet, then connect to it.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` or `DbIoError::ExecutionError`.
    pub async fn create_database(options: ConnectOptions, database: &str) -> Result<Self, DbIoError> {
        Self::create_database_with(options, database, &StdinCredentials::default()).await
    }

    /// [`DbIo::create_database`], asking `credentials` for anything the options leave blank.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` or `DbIoError::ExecutionError`.
    pub async fn create_database_with(
        mut options: ConnectOptions,
        database: &str,
        credentials: &dyn CredentialSource,
    ) -> Result<Self, DbIoError> {
        options.resolve_credentials(credentials)?;
        match options.db_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                let mut conn = maintenance_connection(&options).await?;
                let exists = conn
                    .select(&format!(
                        "SELECT 1 FROM pg_database WHERE datname = {};",
                        add_apostrophes(database)
                    ))
                    .await?;
                if exists.results.is_empty() {
                    conn.execute_batch(&create_database_statement(database)).await?;
                    tracing::info!(database, "created database");
                }
            }
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {}
        }
        options.database = database.to_string();
        Self::reconnect(options).await
    }

    /// Drop `database` if it exists and create it empty, then connect to it.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` or `DbIoError::ExecutionError`.
    pub async fn replace_database(options: ConnectOptions, database: &str) -> Result<Self, DbIoError> {
        Self::replace_database_with(options, database, &StdinCredentials::default()).await
    }

    /// [`DbIo::replace_database`], asking `credentials` for anything the options leave blank.
    ///
    /// # Errors
    /// Returns `DbIoError::ConnectionError` or `DbIoError::ExecutionError`.
    pub async fn replace_database_with(
        mut options: ConnectOptions,
        database: &str,
        credentials: &dyn CredentialSource,
    ) -> Result<Self, DbIoError> {
        options.resolve_credentials(credentials)?;
        match options.db_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                let mut conn = maintenance_connection(&options).await?;
                conn.execute_batch(&format!("DROP DATABASE IF EXISTS {database};"))
                    .await?;
                tracing::info!(database, "dropped database");
            }
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => remove_sqlite_files(database)?,
        }
        let credentials = StaticCredentials {
            user: options.user.clone(),
            password: options.password.clone(),
        };
        Self::create_database_with(options, database, &credentials).await
    }

    async fn reconnect(options: ConnectOptions) -> Result<Self, DbIoError> {
        let credentials = StaticCredentials {
            user: options.user.clone(),
            password: options.password.clone(),
        };
        Self::connect_with(options, &credentials).await
    }

    async fn check_alive(&self) -> Result<(), DbIoError> {
        let mut conn = self.get_connection().await?;
        conn.select("SELECT 1").await.map(|_| ())
    }

    /// Check a connection out of the session pool.
    ///
    /// # Errors
    /// Returns a pool error if no connection can be obtained.
    pub async fn get_connection(&self) -> Result<MiddlewarePoolConnection, DbIoError> {
        self.pool.get_connection().await
    }

    #[must_use]
    pub fn db_type(&self) -> DatabaseType {
        self.options.db_type
    }

    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.options.database
    }

    /// Wall-clock time the credentials were accepted.
    #[must_use]
    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The installed column schema.
    ///
    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded` until a schema has been installed.
    pub fn schema(&self) -> Result<&ColumnSchema, DbIoError> {
        self.schema
            .get()
            .map(|schema| &**schema)
            .ok_or(DbIoError::SchemaNotLoaded { table: None })
    }

    /// Install the session schema. Only the first call succeeds.
    ///
    /// # Errors
    /// Returns `DbIoError::ConfigError` if a schema is already installed.
    pub fn set_schema(&self, schema: ColumnSchema) -> Result<(), DbIoError> {
        self.schema
            .set(Arc::new(schema))
            .map_err(|_| DbIoError::ConfigError("column schema is already loaded".to_string()))
    }

    /// Read the schema file and install it.
    ///
    /// # Errors
    /// Returns `DbIoError::ConfigError` if the file is unreadable or a schema is already set.
    pub fn load_schema_file(&self, path: impl AsRef<Path>) -> Result<(), DbIoError> {
        self.set_schema(ColumnSchema::from_file(path)?)
    }

    /// Read table and column names from the live database and install them.
    ///
    /// # Errors
    /// Returns a query error, or `DbIoError::ConfigError` if a schema is already set.
    pub async fn introspect_schema(&self) -> Result<(), DbIoError> {
        let schema = self.read_live_schema().await?;
        tracing::info!(tables = schema.tables().count(), "introspected column schema");
        self.set_schema(schema)
    }

    async fn read_live_schema(&self) -> Result<ColumnSchema, DbIoError> {
        let mut conn = self.get_connection().await?;
        let mut tables: Vec<(String, Vec<ColumnDef>)> = Vec::new();
        match self.db_type() {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                let rs = conn
                    .select(
                        "SELECT table_name::text, column_name::text, data_type::text \
                         FROM information_schema.columns WHERE table_schema = 'public' \
                         ORDER BY table_name, ordinal_position;",
                    )
                    .await?;
                for row in rs.to_text_rows() {
                    let [table, column, data_type] = <[String; 3]>::try_from(row).map_err(|_| {
                        DbIoError::ConfigError("unexpected information_schema row".to_string())
                    })?;
                    let def = ColumnDef {
                        definition: format!("{column} {data_type}"),
                        name: column,
                    };
                    if let Some((_, cols)) = tables.last_mut().filter(|(name, _)| *name == table) {
                        cols.push(def);
                    } else {
                        tables.push((table, vec![def]));
                    }
                }
            }
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {
                let names = conn
                    .select(
                        "SELECT name FROM sqlite_master WHERE type = 'table' \
                         AND name NOT LIKE 'sqlite_%' ORDER BY name;",
                    )
                    .await?
                    .first_column_text();
                for table in names {
                    let info = conn
                        .select(&format!("PRAGMA table_info({});", add_apostrophes(&table)))
                        .await?;
                    let cols = info
                        .to_text_rows()
                        .into_iter()
                        .filter(|row| row.len() > 2)
                        .map(|row| ColumnDef {
                            definition: format!("{} {}", row[1], row[2]).trim().to_string(),
                            name: row[1].clone(),
                        })
                        .collect();
                    tables.push((table, cols));
                }
            }
        }
        Ok(ColumnSchema::from_definitions(tables))
    }

    /// Create every table of a typed schema that does not exist yet.
    ///
    /// # Errors
    /// Stops at the first table the database refuses to create.
    pub async fn new_tables(&self, schema: &ColumnSchema) -> Result<usize, DbIoError> {
        tracing::info!("initializing new tables");
        let mut conn = self.get_connection().await?;
        let statements = schema.create_table_statements();
        for statement in &statements {
            conn.execute_batch(statement).await?;
        }
        Ok(statements.len())
    }
}

async fn build_pool(options: &ConnectOptions) -> Result<MiddlewarePool, DbIoError> {
    match options.db_type {
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => {
            crate::postgres::config::build_pool(options, &options.database).await
        }
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => crate::sqlite::config::build_pool(options).await,
    }
}

/// Copying template0 lets the encoding differ from the cluster default.
#[cfg(feature = "postgres")]
fn create_database_statement(database: &str) -> String {
    format!("CREATE DATABASE {database} TEMPLATE template0 ENCODING 'UTF8';")
}

#[cfg(feature = "postgres")]
async fn maintenance_connection(options: &ConnectOptions) -> Result<MiddlewarePoolConnection, DbIoError> {
    let pool =
        crate::postgres::config::build_pool(options, crate::postgres::config::MAINTENANCE_DATABASE)
            .await?;
    pool.get_connection().await
}

#[cfg(feature = "sqlite")]
fn remove_sqlite_files(path: &str) -> Result<(), DbIoError> {
    if path.contains(":memory:") {
        return Ok(());
    }
    for file in [path.to_string(), format!("{path}-wal"), format!("{path}-shm")] {
        match std::fs::remove_file(&file) {
            Ok(()) => tracing::info!(file = %file, "removed sqlite file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "postgres"))]
mod tests {
    use super::*;

    #[test]
    fn created_databases_are_utf8_from_template0() {
        assert_eq!(
            create_database_statement("zoo"),
            "CREATE DATABASE zoo TEMPLATE template0 ENCODING 'UTF8';"
        );
    }
}
