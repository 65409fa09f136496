//! Row updates, deletes and table truncation.

use std::collections::HashMap;

use crate::error::DbIoError;
use crate::formatter::{LiteralStyle, column_equal_to};
use crate::session::DbIo;
use crate::types::{DatabaseType, Row};

/// Statement that empties `table`. `SQLite` has no `TRUNCATE`, so it gets an unfiltered delete.
#[must_use]
pub fn truncate_statement(db_type: DatabaseType, table: &str) -> String {
    match db_type {
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => format!("TRUNCATE TABLE {table};"),
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => format!("DELETE FROM {table};"),
    }
}

/// `UPDATE <table> SET <c>='v',... WHERE <key_column> = '<key>';`
///
/// Returns `None` when the row width does not match `columns`, or when every field is empty
/// and there is nothing to set.
#[must_use]
pub fn update_statement(
    table: &str,
    columns: &[String],
    key_column: &str,
    key: &str,
    values: &[String],
    style: LiteralStyle,
) -> Option<String> {
    let set = column_equal_to(columns, values, style)?;
    if set.is_empty() {
        return None;
    }
    Some(format!(
        "UPDATE {table} SET {set} WHERE {key_column} = {};",
        style.quote(key)
    ))
}

/// `DELETE FROM <table> WHERE <column> IN ('v1','v2',...);` or `= 'v'` for a single value.
#[must_use]
pub fn delete_statement<S: AsRef<str>>(
    table: &str,
    column: &str,
    values: &[S],
    style: LiteralStyle,
) -> Option<String> {
    match values {
        [] => None,
        [value] => Some(format!(
            "DELETE FROM {table} WHERE {column} = {};",
            style.quote(value.as_ref())
        )),
        values => {
            let list: Vec<String> = values.iter().map(|v| style.quote(v.as_ref())).collect();
            Some(format!("DELETE FROM {table} WHERE {column} IN ({});", list.join(",")))
        }
    }
}

impl DbIo {
    /// Remove every row from `table`.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn truncate_table(&self, table: &str) -> Result<(), DbIoError> {
        let mut conn = self.get_connection().await?;
        conn.execute_batch(&truncate_statement(self.db_type(), table)).await?;
        tracing::info!(table, "truncated table");
        Ok(())
    }

    /// Update each keyed row in place, matching fields to the table's columns by position.
    ///
    /// Empty fields leave their column unchanged. Statements that fail are logged and skipped;
    /// the return value is the number that succeeded.
    ///
    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded`, or `DbIoError::RowWidthMismatch` before any
    /// statement runs when a row does not have one field per column.
    pub async fn update_rows(
        &self,
        table: &str,
        key_column: &str,
        rows: &HashMap<String, Row>,
    ) -> Result<usize, DbIoError> {
        let columns = self.schema()?.column_names(table)?;
        let mut mismatched = rows.values().filter(|row| row.len() != columns.len());
        if mismatched.next().is_some() {
            return Err(DbIoError::RowWidthMismatch {
                table: table.to_string(),
                expected: columns.len(),
                mismatched: 1 + mismatched.count(),
                // keyed rows have no stable position
                first_index: 0,
            });
        }

        let style = self.db_type().literal_style();
        let mut conn = self.get_connection().await?;
        let mut succeeded = 0;
        for (key, values) in rows {
            let Some(statement) = update_statement(table, &columns, key_column, key, values, style)
            else {
                tracing::debug!(table, key = %key, "nothing to update");
                continue;
            };
            match conn.execute(&statement).await {
                Ok(_) => succeeded += 1,
                Err(e) => tracing::error!(table, key = %key, error = %e, "updating row"),
            }
        }
        tracing::info!(table, succeeded, total = rows.len(), "updated rows");
        Ok(succeeded)
    }

    /// `UPDATE <table> SET <target> = <value> WHERE <column> <op> <key>;`
    ///
    /// `value` and `key` are spliced in as written, so they may be SQL expressions; quote
    /// string literals yourself. Returns the number of rows changed.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn update_row(
        &self,
        table: &str,
        target: &str,
        value: &str,
        column: &str,
        op: &str,
        key: &str,
    ) -> Result<usize, DbIoError> {
        let mut conn = self.get_connection().await?;
        conn.execute(&format!(
            "UPDATE {table} SET {target} = {value} WHERE {column} {op} {key};"
        ))
        .await
    }

    /// Delete the rows where `column` equals `value`.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn delete_row(&self, table: &str, column: &str, value: &str) -> Result<usize, DbIoError> {
        self.delete_rows(table, column, &[value]).await
    }

    /// Delete the rows where `column` matches any of `values`. No values deletes nothing.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn delete_rows<S: AsRef<str> + Sync>(
        &self,
        table: &str,
        column: &str,
        values: &[S],
    ) -> Result<usize, DbIoError> {
        let style = self.db_type().literal_style();
        let Some(statement) = delete_statement(table, column, values, style) else {
            return Ok(0);
        };
        let mut conn = self.get_connection().await?;
        let deleted = conn.execute(&statement).await?;
        tracing::info!(table, deleted, "deleted rows");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["ID".into(), "Name".into(), "Age".into()]
    }

    #[test]
    fn update_skips_empty_fields() {
        let values: Row = vec![String::new(), "O'Malley".into(), "7".into()];
        assert_eq!(
            update_statement("Animals", &columns(), "ID", "3", &values, LiteralStyle::Standard)
                .as_deref(),
            Some("UPDATE Animals SET Name='O''Malley',Age='7' WHERE ID = '3';")
        );
    }

    #[test]
    #[cfg(feature = "postgres")]
    fn update_uses_escape_strings_on_postgres() {
        let values: Row = vec!["3".into(), "red_fox".into(), String::new()];
        assert_eq!(
            update_statement(
                "Animals",
                &columns(),
                "ID",
                "3",
                &values,
                DatabaseType::Postgres.literal_style()
            )
            .as_deref(),
            Some(r"UPDATE Animals SET ID=E'3',Name=E'red\_fox' WHERE ID = E'3';")
        );
    }

    #[test]
    fn update_with_nothing_to_set_is_skipped() {
        let empty: Row = vec![String::new(); 3];
        assert!(update_statement("Animals", &columns(), "ID", "1", &empty, LiteralStyle::Standard).is_none());
        let short: Row = vec!["x".into()];
        assert!(update_statement("Animals", &columns(), "ID", "1", &short, LiteralStyle::Standard).is_none());
    }

    #[test]
    fn delete_builds_equality_or_list() {
        assert_eq!(
            delete_statement("Animals", "Name", &["stoat"], LiteralStyle::Standard).as_deref(),
            Some("DELETE FROM Animals WHERE Name = 'stoat';")
        );
        assert_eq!(
            delete_statement("Animals", "ID", &["1", "2"], LiteralStyle::Standard).as_deref(),
            Some("DELETE FROM Animals WHERE ID IN ('1','2');")
        );
        assert!(delete_statement::<&str>("Animals", "ID", &[], LiteralStyle::Standard).is_none());
    }

    #[test]
    fn truncate_per_backend() {
        #[cfg(feature = "postgres")]
        assert_eq!(truncate_statement(DatabaseType::Postgres, "t"), "TRUNCATE TABLE t;");
        #[cfg(feature = "sqlite")]
        assert_eq!(truncate_statement(DatabaseType::Sqlite, "t"), "DELETE FROM t;");
    }
}
