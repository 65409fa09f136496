use std::collections::HashMap;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Text a null column renders as when a result set is marshaled to strings.
pub const NIL_MARKER: &str = "<nil>";

/// A value read back from a database column.
///
/// Every backend decodes into this enum before the read-side helpers render it to text:
/// ```rust
/// use sql_dbio::prelude::*;
///
/// assert_eq!(RowValues::Int(7).to_field_string(), "7");
/// assert_eq!(RowValues::Null.to_field_string(), "<nil>");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Default text conversion used by the generic row extraction.
    ///
    /// No type-specific handling: integers, timestamps and blobs all become plain text, and
    /// NULL becomes [`NIL_MARKER`].
    #[must_use]
    pub fn to_field_string(&self) -> String {
        match self {
            RowValues::Int(i) => i.to_string(),
            RowValues::Float(f) => f.to_string(),
            RowValues::Text(s) => s.clone(),
            RowValues::Bool(b) => b.to_string(),
            RowValues::Timestamp(ts) => ts.to_string(),
            RowValues::Null => NIL_MARKER.to_string(),
            RowValues::JSON(json) => json.to_string(),
            RowValues::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// The database type supported by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum DatabaseType {
    /// `PostgreSQL` database
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite` database
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// One row of field values, already converted to text.
pub type Row = Vec<String>;

/// Rows waiting to be formatted or uploaded.
///
/// Keyed rows iterate in hash order; nothing downstream may depend on that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSet {
    Positional(Vec<Row>),
    Keyed(HashMap<String, Row>),
}

impl RowSet {
    /// Build a positional set from any text-convertible scalars.
    pub fn from_rows<R, T>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = T>,
        T: ToString,
    {
        RowSet::Positional(
            rows.into_iter()
                .map(|row| row.into_iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    /// Build a positional set from raw bytes.
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD, which the formatter then treats as
    /// corrupt text.
    pub fn from_byte_rows<R, B>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        RowSet::Positional(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|v| String::from_utf8_lossy(v.as_ref()).into_owned())
                        .collect()
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RowSet::Positional(rows) => rows.len(),
            RowSet::Keyed(rows) => rows.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Row> + '_> {
        match self {
            RowSet::Positional(rows) => Box::new(rows.iter()),
            RowSet::Keyed(rows) => Box::new(rows.values()),
        }
    }

    /// Flatten into a positional sequence. Keyed sets come out in iteration order.
    #[must_use]
    pub fn into_positional(self) -> Vec<Row> {
        match self {
            RowSet::Positional(rows) => rows,
            RowSet::Keyed(rows) => rows.into_values().collect(),
        }
    }
}

impl From<Vec<Row>> for RowSet {
    fn from(rows: Vec<Row>) -> Self {
        RowSet::Positional(rows)
    }
}

impl From<HashMap<String, Row>> for RowSet {
    fn from(rows: HashMap<String, Row>) -> Self {
        RowSet::Keyed(rows)
    }
}

impl DatabaseType {
    /// Literal style the engine parses the way the formatter intends.
    #[must_use]
    pub fn literal_style(self) -> crate::formatter::LiteralStyle {
        match self {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => crate::formatter::LiteralStyle::PostgresEscape,
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => crate::formatter::LiteralStyle::Standard,
        }
    }
}
