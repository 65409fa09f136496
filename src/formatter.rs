//! Rendering of in-memory rows into the `VALUES` fragment of an `INSERT`.
//!
//! Every field is validated, normalized and escaped on its own, then wrapped in quotes:
//! ```rust
//! use sql_dbio::prelude::*;
//!
//! let rows = RowSet::from_rows([["3", "egret", "na"], ["4", "black_footed_ferret", "20"]]);
//! let formatted = format_rows(&rows);
//! assert_eq!(
//!     formatted.literal,
//!     r"('3','egret','NA'),('4','black\_footed\_ferret','20')"
//! );
//! assert_eq!(formatted.count, 2);
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::types::{Row, RowSet};

/// Canonical "not available" sentinel.
pub const NA: &str = "NA";

/// Characters that get a preceding backslash.
const RESERVED: [char; 3] = ['\'', '"', '_'];

/// Written by lossy UTF-8 decoding in place of invalid byte sequences.
const CORRUPT_MARKER: char = '\u{FFFD}';

static NA_VARIANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*n\s*/?\s*a\s*$").expect("NA pattern is valid"));

/// How a formatted field is written as an SQL string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LiteralStyle {
    /// `'...'` with backslash escapes (MySQL-style string literals).
    #[default]
    Backslash,
    /// `E'...'` with the same backslash escapes; understood by `PostgreSQL`.
    PostgresEscape,
    /// `'...'` with embedded quotes doubled and no backslash escapes (`SQLite`).
    Standard,
}

impl LiteralStyle {
    fn write_literal(self, buffer: &mut String, field: &str) {
        match self {
            LiteralStyle::Backslash => {
                buffer.push('\'');
                buffer.push_str(&escape_reserved(field));
                buffer.push('\'');
            }
            LiteralStyle::PostgresEscape => {
                buffer.push_str("E'");
                buffer.push_str(&escape_reserved(field));
                buffer.push('\'');
            }
            LiteralStyle::Standard => {
                buffer.push('\'');
                buffer.push_str(&field.replace('\'', "''"));
                buffer.push('\'');
            }
        }
    }

    /// Quote an already-normalized field as a literal in this style.
    #[must_use]
    pub fn quote(self, field: &str) -> String {
        let mut buffer = String::with_capacity(field.len() + 3);
        self.write_literal(&mut buffer, &replace_backslashes(field));
        buffer
    }
}

/// Where a field sat in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldPosition {
    pub row: usize,
    pub column: usize,
}

/// What the formatter changed while rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Fields inspected.
    pub fields: usize,
    /// Fields replaced wholesale with [`NA`] because their text was corrupt.
    pub downgraded: Vec<FieldPosition>,
    /// Fields that were a spelling of "not available" and now read [`NA`].
    pub normalized_na: usize,
}

impl ValidationReport {
    #[must_use]
    pub fn downgraded_count(&self) -> usize {
        self.downgraded.len()
    }

    pub fn merge(&mut self, other: ValidationReport, row_offset: usize) {
        self.fields += other.fields;
        self.normalized_na += other.normalized_na;
        self.downgraded
            .extend(other.downgraded.into_iter().map(|pos| FieldPosition {
                row: pos.row + row_offset,
                column: pos.column,
            }));
    }
}

/// The `(..),(..)` fragment plus bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormattedRows {
    pub literal: String,
    pub count: usize,
    pub report: ValidationReport,
}

enum FieldState {
    Kept,
    NormalizedNa,
    Downgraded,
}

fn is_corrupt(value: &str) -> bool {
    value.contains(CORRUPT_MARKER) || value.contains('\0')
}

fn is_na_variant(value: &str) -> bool {
    NA_VARIANT.is_match(value)
}

fn replace_backslashes(value: &str) -> Cow<'_, str> {
    if value.contains('\\') {
        Cow::Owned(value.replace('\\', "-"))
    } else {
        Cow::Borrowed(value)
    }
}

fn escape_reserved(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Validate and normalize one field before it is quoted.
fn prepare_field(value: &str) -> (Cow<'_, str>, FieldState) {
    if value.parse::<i64>().is_ok() {
        return (Cow::Borrowed(value), FieldState::Kept);
    }
    if is_corrupt(value) {
        return (Cow::Borrowed(NA), FieldState::Downgraded);
    }
    if value != NA && is_na_variant(value) {
        return (Cow::Borrowed(NA), FieldState::NormalizedNa);
    }
    (replace_backslashes(value), FieldState::Kept)
}

/// Escape reserved characters and standardize NA spellings.
///
/// Backslashes become hyphens first so no new escape sequence can appear, then every single
/// quote, double quote and underscore gets a preceding backslash.
#[must_use]
pub fn escape_chars(value: &str) -> String {
    let value = replace_backslashes(value);
    if is_na_variant(&value) {
        return NA.to_string();
    }
    escape_reserved(&value)
}

/// Undo the backslash escaping of [`escape_chars`].
///
/// The backslash-to-hyphen substitution is lossy and is not reversed.
#[must_use]
pub fn unescape_chars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.peek() {
                if RESERVED.contains(next) {
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn write_row(
    buffer: &mut String,
    row: &[String],
    row_idx: usize,
    style: LiteralStyle,
    report: &mut ValidationReport,
) {
    buffer.push('(');
    for (col_idx, value) in row.iter().enumerate() {
        if col_idx != 0 {
            buffer.push(',');
        }
        let (field, state) = prepare_field(value);
        match state {
            FieldState::Kept => {}
            FieldState::NormalizedNa => report.normalized_na += 1,
            FieldState::Downgraded => {
                tracing::warn!(row = row_idx, column = col_idx, "replacing corrupt field with NA");
                report.downgraded.push(FieldPosition {
                    row: row_idx,
                    column: col_idx,
                });
            }
        }
        report.fields += 1;
        style.write_literal(buffer, &field);
    }
    buffer.push(')');
}

/// Format rows in the given literal style.
pub fn format_iter<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    style: LiteralStyle,
) -> FormattedRows {
    let mut formatted = FormattedRows::default();
    for (idx, row) in rows.into_iter().enumerate() {
        if idx != 0 {
            formatted.literal.push(',');
        }
        write_row(
            &mut formatted.literal,
            row,
            idx,
            style,
            &mut formatted.report,
        );
        formatted.count += 1;
    }
    formatted
}

/// Format a row set with backslash escapes.
///
/// An empty set yields an empty literal and a count of 0; no `INSERT` should be issued for it.
#[must_use]
pub fn format_rows(rows: &RowSet) -> FormattedRows {
    format_rows_as(rows, LiteralStyle::Backslash)
}

#[must_use]
pub fn format_rows_as(rows: &RowSet, style: LiteralStyle) -> FormattedRows {
    format_iter(rows.iter(), style)
}

#[must_use]
pub fn format_slice(rows: &[Row], style: LiteralStyle) -> FormattedRows {
    format_iter(rows, style)
}

/// Format a single row as one `(..)` tuple.
#[must_use]
pub fn format_row(row: &Row, style: LiteralStyle) -> FormattedRows {
    format_iter(std::iter::once(row), style)
}

/// Wrap each comma-separated term in single quotes, doubling any quote inside a term.
#[must_use]
pub fn add_apostrophes(key: &str) -> String {
    key.split(',')
        .map(|term| format!("'{}'", term.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build a `col='value',...` SET clause by matching columns to values by index.
///
/// Empty values leave their column out of the clause. Returns `None` when the row does not
/// have exactly one value per column.
#[must_use]
pub fn column_equal_to(columns: &[String], values: &[String], style: LiteralStyle) -> Option<String> {
    if columns.len() != values.len() {
        return None;
    }
    let clause = columns
        .iter()
        .zip(values)
        .filter(|(_, value)| !value.is_empty())
        .map(|(column, value)| format!("{column}={}", style.quote(value)))
        .collect::<Vec<_>>()
        .join(",");
    Some(clause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn animals() -> Vec<Row> {
        vec![
            vec!["1".into(), "Weasel".into(), "15".into()],
            vec!["2".into(), "stoat".into(), "9".into()],
            vec!["3".into(), "egret".into(), "na".into()],
            vec!["4".into(), "black_footed_ferret".into(), "20".into()],
        ]
    }

    const EXPECTED: &str =
        r"('1','Weasel','15'),('2','stoat','9'),('3','egret','NA'),('4','black\_footed\_ferret','20')";

    #[test]
    fn escapes_reserved_characters() {
        let cases = [
            ("N/A", "NA"),
            ("Na", "NA"),
            ("na", "NA"),
            ("black_footed_ferret", r"black\_footed\_ferret"),
            ("weasel: 'Fred'", r"weasel: \'Fred\'"),
            (r#"badger\ "Reggie" "#, r#"badger- \"Reggie\" "#),
        ];
        for (input, expected) in cases {
            assert_eq!(escape_chars(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn na_variants_collapse_to_sentinel() {
        for variant in ["na", "Na", "nA", "NA", "N/A", "n/a", " N / A "] {
            let formatted = format_rows(&RowSet::from_rows([[variant]]));
            assert_eq!(formatted.literal, "('NA')", "variant {variant:?}");
        }
        assert_eq!(escape_chars("nation"), "nation");
    }

    #[test]
    fn formats_positional_rows() {
        let formatted = format_rows(&RowSet::Positional(animals()));
        assert_eq!(formatted.literal, EXPECTED);
        assert_eq!(formatted.count, 4);
        assert_eq!(formatted.report.normalized_na, 1);
        assert_eq!(formatted.report.fields, 12);
        assert!(formatted.report.downgraded.is_empty());
    }

    #[test]
    fn formats_keyed_rows_in_any_order() {
        let keyed: HashMap<String, Row> = ["a", "b", "c", "d"]
            .into_iter()
            .map(String::from)
            .zip(animals())
            .collect();
        let formatted = format_rows(&RowSet::Keyed(keyed));
        assert_eq!(formatted.count, 4);

        let strip = |s: &str| s.trim_matches(|c| c == '(' || c == ')').to_string();
        let mut actual: Vec<String> = formatted.literal.split("),(").map(strip).collect();
        let mut expected: Vec<String> = EXPECTED.split("),(").map(strip).collect();
        actual.sort();
        expected.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn empty_set_has_no_literal() {
        let formatted = format_rows(&RowSet::Positional(Vec::new()));
        assert_eq!(formatted.literal, "");
        assert_eq!(formatted.count, 0);

        let formatted = format_rows(&RowSet::Keyed(HashMap::new()));
        assert_eq!(formatted.count, 0);
    }

    #[test]
    fn single_row_count() {
        let row: Row = vec!["7".into(), "mink".into()];
        let formatted = format_row(&row, LiteralStyle::Backslash);
        assert_eq!(formatted.literal, "('7','mink')");
        assert_eq!(formatted.count, 1);
    }

    #[test]
    fn corrupt_text_is_downgraded_and_reported() {
        let rows = RowSet::from_byte_rows([vec![&b"5"[..], &b"ot\xffter"[..], &b"nul\0l"[..]]]);
        let formatted = format_rows(&rows);
        assert_eq!(formatted.literal, "('5','NA','NA')");
        assert_eq!(formatted.report.downgraded_count(), 2);
        assert_eq!(
            formatted.report.downgraded[0],
            FieldPosition { row: 0, column: 1 }
        );
    }

    #[test]
    fn styles_differ_only_in_quoting() {
        let rows = RowSet::from_rows([["weasel: 'Fred'", r"a\b_c"]]);
        assert_eq!(
            format_rows_as(&rows, LiteralStyle::PostgresEscape).literal,
            r"(E'weasel: \'Fred\'',E'a-b\_c')"
        );
        assert_eq!(
            format_rows_as(&rows, LiteralStyle::Standard).literal,
            "('weasel: ''Fred''','a-b_c')"
        );
    }

    #[test]
    fn unescape_recovers_content() {
        for input in ["black_footed_ferret", "weasel: 'Fred'", r#"say "hi""#, "plain"] {
            assert_eq!(unescape_chars(&escape_chars(input)), input);
        }
        assert_eq!(unescape_chars(&escape_chars(r"back\slash")), "back-slash");
    }

    #[test]
    fn apostrophes_wrap_each_term() {
        let cases = [
            ("1,Weasel,15", "'1','Weasel','15'"),
            ("3,egret,NA", "'3','egret','NA'"),
            (r"4,black\_footed\_ferret,20", r"'4','black\_footed\_ferret','20'"),
        ];
        for (input, expected) in cases {
            assert_eq!(add_apostrophes(input), expected);
        }
    }

    #[test]
    fn set_clause_skips_empty_fields() {
        let columns: Vec<String> = ["ID", "Name", "Age"].map(String::from).to_vec();
        let rows: [&[&str]; 4] = [
            &["1", "Lion", "12"],
            &["2", "Tiger", ""],
            &["3", "", "6"],
            &["Leopard", "5"],
        ];
        let actual: Vec<Option<String>> = rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(|s| s.to_string()).collect();
                column_equal_to(&columns, &values, LiteralStyle::Backslash)
            })
            .collect();
        assert_eq!(
            actual,
            vec![
                Some("ID='1',Name='Lion',Age='12'".to_string()),
                Some("ID='2',Name='Tiger'".to_string()),
                Some("ID='3',Age='6'".to_string()),
                None,
            ]
        );
    }
}
