//! Read-side helpers. Every row comes back as text through [`rows_to_text`].

use std::collections::HashMap;

use crate::error::DbIoError;
use crate::formatter::{LiteralStyle, add_apostrophes};
use crate::results::{ResultSet, rows_to_text};
use crate::session::DbIo;
use crate::types::{Row, RowValues};

/// `SELECT <target> FROM <table> WHERE <column> ...` matching one key or a comma-separated list.
///
/// A list is quoted term by term unless the caller already quoted it.
#[must_use]
pub fn select_by_key(table: &str, column: &str, key: &str, target: &str, style: LiteralStyle) -> String {
    if key.contains(',') {
        let list = if key.contains('\'') {
            key.to_string()
        } else {
            add_apostrophes(key)
        };
        format!("SELECT {target} FROM {table} WHERE {column} IN ({list});")
    } else {
        format!("SELECT {target} FROM {table} WHERE {column} = {};", style.quote(key))
    }
}

fn integer(value: &RowValues, what: &str) -> Result<i64, DbIoError> {
    match value {
        RowValues::Int(i) => Ok(*i),
        RowValues::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| DbIoError::ConversionError(format!("{what}: `{s}` is not an integer"))),
        other => Err(DbIoError::ConversionError(format!(
            "{what}: {other:?} is not an integer"
        ))),
    }
}

impl DbIo {
    async fn select(&self, query: &str) -> Result<ResultSet, DbIoError> {
        let mut conn = self.get_connection().await?;
        conn.select(query).await
    }

    async fn select_text(&self, query: &str) -> Result<Vec<Row>, DbIoError> {
        Ok(rows_to_text(&self.select(query).await?))
    }

    /// Number of rows in `table`.
    ///
    /// # Errors
    /// Returns a query error, or `DbIoError::ConversionError` if the count is not an integer.
    pub async fn count_rows(&self, table: &str) -> Result<i64, DbIoError> {
        let rs = self.select(&format!("SELECT COUNT(*) FROM {table};")).await?;
        match rs.results.first().and_then(|row| row.get_by_index(0)) {
            Some(value) => integer(value, "row count"),
            None => Ok(0),
        }
    }

    /// Largest value in an integer column; 0 for an empty table.
    ///
    /// # Errors
    /// Returns a query error, or `DbIoError::ConversionError` for a non-integer column.
    pub async fn max_value(&self, table: &str, column: &str) -> Result<i64, DbIoError> {
        if self.count_rows(table).await? == 0 {
            return Ok(0);
        }
        let rs = self.select(&format!("SELECT MAX({column}) FROM {table};")).await?;
        match rs.results.first().and_then(|row| row.get_by_index(0)) {
            Some(RowValues::Null) | None => Ok(0),
            Some(value) => integer(value, column),
        }
    }

    /// `target` columns of the rows whose `column` matches `key`, or any key of a comma list.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn get_rows(&self, table: &str, column: &str, key: &str, target: &str) -> Result<Vec<Row>, DbIoError> {
        let style = self.db_type().literal_style();
        self.select_text(&select_by_key(table, column, key, target, style)).await
    }

    /// `target` columns of the rows where `column >= min`.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn get_rows_min(&self, table: &str, column: &str, target: &str, min: i64) -> Result<Vec<Row>, DbIoError> {
        self.select_text(&format!("SELECT {target} FROM {table} WHERE {column} >= {min};"))
            .await
    }

    /// `target` columns of the rows where `column <op> 'key'`, e.g. `op` = `">="` or `"!="`.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn evaluate_rows(
        &self,
        table: &str,
        column: &str,
        op: &str,
        key: &str,
        target: &str,
    ) -> Result<Vec<Row>, DbIoError> {
        let key = self.db_type().literal_style().quote(key);
        self.select_text(&format!("SELECT {target} FROM {table} WHERE {column} {op} {key};"))
            .await
    }

    /// Every value of an integer column. Nulls are skipped.
    ///
    /// # Errors
    /// Returns a query error, or `DbIoError::ConversionError` on the first non-integer value.
    pub async fn get_column_int(&self, table: &str, column: &str) -> Result<Vec<i64>, DbIoError> {
        let rs = self.select(&format!("SELECT {column} FROM {table};")).await?;
        rs.results
            .iter()
            .filter_map(|row| row.get_by_index(0))
            .filter(|value| !value.is_null())
            .map(|value| integer(value, column))
            .collect()
    }

    /// Every value of a column, as text.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn get_column_text(&self, table: &str, column: &str) -> Result<Vec<String>, DbIoError> {
        Ok(self
            .select(&format!("SELECT {column} FROM {table};"))
            .await?
            .first_column_text())
    }

    /// The given columns of every row.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn get_columns<S: AsRef<str> + Sync>(&self, table: &str, columns: &[S]) -> Result<Vec<Row>, DbIoError> {
        let list: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
        let query = format!("SELECT {} FROM {table};", list.join(","));
        self.select_text(&query).await
    }

    /// How many times each distinct value occurs in `column`.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn get_num_occurrences(&self, table: &str, column: &str) -> Result<HashMap<String, usize>, DbIoError> {
        let mut occurrences = HashMap::new();
        for value in self.get_column_text(table, column).await? {
            *occurrences.entry(value).or_insert(0) += 1;
        }
        Ok(occurrences)
    }

    /// The whole table.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn get_table(&self, table: &str) -> Result<Vec<Row>, DbIoError> {
        self.select_text(&format!("SELECT * FROM {table};")).await
    }

    /// The whole table keyed by its first column; the key is removed from each row.
    ///
    /// # Errors
    /// Returns `DbIoError::StatementError` or `DbIoError::ExecutionError`.
    pub async fn get_table_map(&self, table: &str) -> Result<HashMap<String, Row>, DbIoError> {
        Ok(self
            .select(&format!("SELECT * FROM {table};"))
            .await?
            .to_keyed_text())
    }
}
