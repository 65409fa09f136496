use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::chunking::{PAYLOAD_CEILING, SAFETY_FACTOR};
use crate::error::DbIoError;
use crate::types::DatabaseType;

/// User name that never needs a password.
pub const GUEST_USER: &str = "guest";

#[cfg(feature = "postgres")]
const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Connection settings for one session.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub db_type: DatabaseType,
    pub host: String,
    pub port: Option<u16>,
    /// Database name; for `SQLite` this is the file path.
    pub database: String,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ConnectOptions {
    #[cfg(feature = "postgres")]
    #[must_use]
    pub fn postgres_builder(database: impl Into<String>) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(DatabaseType::Postgres, database)
    }

    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn sqlite_builder(path: impl Into<String>) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(DatabaseType::Sqlite, path)
    }

    /// Host with a blank value mapped to `localhost`.
    #[must_use]
    pub fn host_or_default(&self) -> &str {
        let host = self.host.trim();
        if host.is_empty() { "localhost" } else { host }
    }

    #[must_use]
    pub fn port_or_default(&self) -> u16 {
        match self.db_type {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => self.port.unwrap_or(DEFAULT_POSTGRES_PORT),
            #[allow(unreachable_patterns)]
            _ => self.port.unwrap_or_default(),
        }
    }

    /// True when a password must be asked for before connecting.
    #[must_use]
    pub fn needs_password(&self) -> bool {
        #[cfg(feature = "sqlite")]
        if self.db_type == DatabaseType::Sqlite {
            return false;
        }
        self.user != GUEST_USER && self.password.is_empty()
    }

    /// Fill in a missing user name and password from `source`.
    ///
    /// # Errors
    /// Returns `DbIoError::ConfigError` if the source cannot supply a value.
    pub fn resolve_credentials(&mut self, source: &dyn CredentialSource) -> Result<(), DbIoError> {
        #[cfg(feature = "sqlite")]
        if self.db_type == DatabaseType::Sqlite {
            return Ok(());
        }
        if self.user.trim().is_empty() {
            self.user = source.user_name()?.trim().to_string();
        }
        if self.needs_password() {
            self.password = source.password(&self.user)?;
        }
        Ok(())
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct ConnectOptionsBuilder {
    opts: ConnectOptions,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(db_type: DatabaseType, database: impl Into<String>) -> Self {
        Self {
            opts: ConnectOptions {
                db_type,
                host: String::new(),
                port: None,
                database: database.into(),
                user: String::new(),
                password: String::new(),
                max_connections: 4,
            },
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = Some(port);
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.opts.user = user.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = password.into();
        self
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.opts.max_connections = max_connections.max(1);
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectOptions {
        self.opts
    }
}

/// Supplies credentials the caller left blank.
pub trait CredentialSource: Send + Sync {
    /// # Errors
    /// Returns `DbIoError::ConfigError` if no user name is available.
    fn user_name(&self) -> Result<String, DbIoError>;

    /// # Errors
    /// Returns `DbIoError::ConfigError` if no password is available.
    fn password(&self, user: &str) -> Result<String, DbIoError>;
}

/// Reads one answer for the given label.
pub type PromptFn = fn(&str) -> io::Result<String>;

/// Prompts on the terminal: the user name is echoed, the password is not.
#[derive(Debug, Clone, Copy)]
pub struct StdinCredentials {
    visible: PromptFn,
    hidden: PromptFn,
}

impl Default for StdinCredentials {
    fn default() -> Self {
        Self {
            visible: read_visible,
            hidden: read_hidden,
        }
    }
}

impl StdinCredentials {
    /// Swap the readers used for echoed and hidden answers.
    #[must_use]
    pub fn with_prompts(visible: PromptFn, hidden: PromptFn) -> Self {
        Self { visible, hidden }
    }
}

fn read_visible(label: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "\n\t{label}: ")?;
    stderr.flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_hidden(label: &str) -> io::Result<String> {
    rpassword::prompt_password(format!("\n\t{label}: "))
}

fn answer(prompt: PromptFn, label: &str) -> Result<String, DbIoError> {
    prompt(label).map_err(|e| DbIoError::ConfigError(format!("no input for {label}: {e}")))
}

impl CredentialSource for StdinCredentials {
    fn user_name(&self) -> Result<String, DbIoError> {
        answer(self.visible, "Enter user name")
    }

    fn password(&self, user: &str) -> Result<String, DbIoError> {
        answer(self.hidden, &format!("Enter password for {user}"))
    }
}

/// Fixed answers, for scripts and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub user: String,
    pub password: String,
}

impl CredentialSource for StaticCredentials {
    fn user_name(&self) -> Result<String, DbIoError> {
        Ok(self.user.clone())
    }

    fn password(&self, _user: &str) -> Result<String, DbIoError> {
        Ok(self.password.clone())
    }
}

/// Progress after one committed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Offset one past the last committed row.
    pub rows_done: usize,
    pub total_rows: usize,
}

pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Tuning for chunked uploads.
#[derive(Clone)]
pub struct UploadOptions {
    pub payload_ceiling: usize,
    pub safety_factor: usize,
    pub on_progress: Option<ProgressCallback>,
    /// Checked between chunks; a statement already sent is never interrupted.
    pub cancel: Option<CancellationToken>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            payload_ceiling: PAYLOAD_CEILING,
            safety_factor: SAFETY_FACTOR,
            on_progress: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("payload_ceiling", &self.payload_ceiling)
            .field("safety_factor", &self.safety_factor)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl UploadOptions {
    #[must_use]
    pub fn payload_ceiling(mut self, bytes: usize) -> Self {
        self.payload_ceiling = bytes.max(1);
        self
    }

    #[must_use]
    pub fn safety_factor(mut self, factor: usize) -> Self {
        self.safety_factor = factor.max(1);
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(UploadProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
