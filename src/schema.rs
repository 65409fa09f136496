//! Table-to-column mapping used to build every generated statement.
//!
//! The file format is line oriented: a line starting with `#` names a table and each
//! following line declares one column, optionally with its type.
//! ```text
//! # Animals
//! ID INTEGER PRIMARY KEY
//! Name TEXT
//! Age INTEGER
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DbIoError;

/// A declared column: its name and the full declaration line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub definition: String,
}

impl ColumnDef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            definition: name.clone(),
            name,
        }
    }

    fn from_line(line: &str) -> Self {
        let definition = line.trim().to_string();
        let name = definition
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        Self { name, definition }
    }
}

/// Immutable column lists per table, built once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    tables: BTreeMap<String, Vec<ColumnDef>>,
}

impl ColumnSchema {
    /// Parse the line-oriented schema format. Lines shorter than three bytes are ignored.
    ///
    /// # Errors
    /// Returns `DbIoError::ConfigError` when a column appears before any `#table` line.
    pub fn parse(text: &str) -> Result<Self, DbIoError> {
        let mut tables: BTreeMap<String, Vec<ColumnDef>> = BTreeMap::new();
        let mut current: Option<String> = None;
        for (lineno, line) in text.lines().enumerate() {
            if line.len() < 3 {
                continue;
            }
            if let Some(table) = line.strip_prefix('#') {
                let table = table.trim().to_string();
                tables.entry(table.clone()).or_default();
                current = Some(table);
            } else {
                let table = current.as_ref().ok_or_else(|| {
                    DbIoError::ConfigError(format!(
                        "column declared before any table on line {}",
                        lineno + 1
                    ))
                })?;
                if let Some(columns) = tables.get_mut(table) {
                    columns.push(ColumnDef::from_line(line));
                }
            }
        }
        Ok(Self { tables })
    }

    /// Read and parse a schema file.
    ///
    /// # Errors
    /// Returns `DbIoError::ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DbIoError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbIoError::ConfigError(format!("reading schema file {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Build a schema from untyped column name lists.
    pub fn from_columns<T, C>(tables: impl IntoIterator<Item = (T, Vec<C>)>) -> Self
    where
        T: Into<String>,
        C: Into<String>,
    {
        Self {
            tables: tables
                .into_iter()
                .map(|(table, cols)| (table.into(), cols.into_iter().map(ColumnDef::new).collect()))
                .collect(),
        }
    }

    /// Build a schema from full column declarations, keeping the given column order.
    pub fn from_definitions<T: Into<String>>(tables: impl IntoIterator<Item = (T, Vec<ColumnDef>)>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|(table, cols)| (table.into(), cols))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded` if the table is unknown.
    pub fn columns(&self, table: &str) -> Result<&[ColumnDef], DbIoError> {
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| DbIoError::SchemaNotLoaded {
                table: Some(table.to_string()),
            })
    }

    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded` if the table is unknown.
    pub fn column_names(&self, table: &str) -> Result<Vec<String>, DbIoError> {
        Ok(self.columns(table)?.iter().map(|c| c.name.clone()).collect())
    }

    /// Comma-joined column names, ready for an `INSERT INTO t (...)` list.
    ///
    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded` if the table is unknown or has no columns.
    pub fn column_list(&self, table: &str) -> Result<String, DbIoError> {
        let names = self.column_names(table)?;
        if names.is_empty() {
            return Err(DbIoError::SchemaNotLoaded {
                table: Some(table.to_string()),
            });
        }
        Ok(names.join(","))
    }

    /// # Errors
    /// Returns `DbIoError::SchemaNotLoaded` if the table is unknown.
    pub fn column_count(&self, table: &str) -> Result<usize, DbIoError> {
        Ok(self.columns(table)?.len())
    }

    /// `CREATE TABLE IF NOT EXISTS` for every table, using the full column declarations.
    #[must_use]
    pub fn create_table_statements(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|(_, cols)| !cols.is_empty())
            .map(|(table, cols)| {
                let defs: Vec<&str> = cols.iter().map(|c| c.definition.as_str()).collect();
                format!("CREATE TABLE IF NOT EXISTS {table}({});", defs.join(", "))
            })
            .collect()
    }
}
