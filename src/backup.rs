//! Dump a database to `<outdir>/<database>.<YYYY-MM-DD>.sql` with the engine's own tool.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use chrono::{Local, NaiveDate};
use tokio::process::Command;

use crate::error::DbIoError;
use crate::session::DbIo;
use crate::types::DatabaseType;

/// Backup file for `database` taken on `date`. A blank `outdir` means the working directory.
#[must_use]
pub fn backup_file_name(outdir: impl AsRef<Path>, database: &str, date: NaiveDate) -> PathBuf {
    // SQLite sessions name their database by path; only the file name goes into the dump name.
    let stem = Path::new(database)
        .file_name()
        .map_or_else(|| database.to_string(), |name| name.to_string_lossy().into_owned());
    outdir
        .as_ref()
        .join(format!("{stem}.{}.sql", date.format("%Y-%m-%d")))
}

fn check_status(tool: &str, output: &Output) -> Result<(), DbIoError> {
    if output.status.success() {
        return Ok(());
    }
    Err(DbIoError::BackupError(format!(
        "{tool} exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

impl DbIo {
    /// Back up the session database into `outdir` and return the file written.
    ///
    /// `PostgreSQL` is dumped with `pg_dump`, `SQLite` with `sqlite3 <path> .dump`; the tool
    /// must be on `PATH`.
    ///
    /// # Errors
    /// Returns `DbIoError::BackupError` if the tool cannot be started or exits non-zero.
    pub async fn backup(&self, outdir: impl AsRef<Path>) -> Result<PathBuf, DbIoError> {
        let outfile = backup_file_name(outdir, self.database(), Local::now().date_naive());
        tracing::info!(database = self.database(), file = %outfile.display(), "backing up database");

        match self.db_type() {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => {
                let opts = self.options();
                let output = Command::new("pg_dump")
                    .arg("-h")
                    .arg(opts.host_or_default())
                    .arg("-p")
                    .arg(opts.port_or_default().to_string())
                    .arg("-U")
                    .arg(&opts.user)
                    .arg("-f")
                    .arg(&outfile)
                    .arg(&opts.database)
                    .env("PGPASSWORD", &opts.password)
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| DbIoError::BackupError(format!("starting pg_dump: {e}")))?;
                check_status("pg_dump", &output)?;
            }
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => {
                let output = Command::new("sqlite3")
                    .arg(self.database())
                    .arg(".dump")
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| DbIoError::BackupError(format!("starting sqlite3: {e}")))?;
                check_status("sqlite3", &output)?;
                tokio::fs::write(&outfile, &output.stdout)
                    .await
                    .map_err(|e| DbIoError::BackupError(format!("writing {}: {e}", outfile.display())))?;
            }
        }

        tracing::info!(database = self.database(), "backup complete");
        Ok(outfile)
    }
}
