use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Row, RowValues};

/// A row from a database query result
///
/// This struct represents a single row from a database query result,
/// with access to both the column names and the values.
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub rows: Vec<RowValues>,
}

impl CustomDbRow {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, rows: Vec<RowValues>) -> Self {
        Self { column_names, rows }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.rows.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.rows.get(index)
    }

    /// Render every value through its default text conversion.
    #[must_use]
    pub fn to_text(&self) -> Row {
        self.rows.iter().map(RowValues::to_field_string).collect()
    }
}

/// A result set from a database query
///
/// This struct represents the result of a database query,
/// containing the rows returned by the query and metadata.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows affected (for DML statements)
    pub rows_affected: usize,
    /// Column names shared by all rows (to avoid duplicating in each row)
    column_names: Option<Arc<Vec<String>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        let column_names = self
            .column_names
            .get_or_insert_with(|| Arc::new(Vec::new()))
            .clone();
        self.results.push(CustomDbRow::new(column_names, row_values));
        self.rows_affected += 1;
    }

    /// Marshal every row into text, in result order.
    ///
    /// Nulls come back as [`NIL_MARKER`](crate::types::NIL_MARKER), not as a typed absence.
    #[must_use]
    pub fn to_text_rows(&self) -> Vec<Row> {
        rows_to_text(self)
    }

    /// The first column of every row, as text.
    #[must_use]
    pub fn first_column_text(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|row| row.rows.first().map(RowValues::to_field_string))
            .collect()
    }

    /// Rows keyed by their first column; the key is removed from the value.
    #[must_use]
    pub fn to_keyed_text(&self) -> HashMap<String, Row> {
        rows_to_text(self)
            .into_iter()
            .filter(|row| !row.is_empty())
            .map(|mut row| {
                let key = row.remove(0);
                (key, row)
            })
            .collect()
    }
}

/// Convert a result set of unknown width and type into rows of text.
#[must_use]
pub fn rows_to_text(result_set: &ResultSet) -> Vec<Row> {
    result_set.results.iter().map(CustomDbRow::to_text).collect()
}
