use std::sync::Arc;

use tokio_postgres::SimpleQueryMessage;

use crate::results::ResultSet;
use crate::types::RowValues;

/// A value as the simple-query protocol returns it: text, or `None` for NULL.
#[must_use]
pub fn text_value(value: Option<&str>) -> RowValues {
    value.map_or(RowValues::Null, |text| RowValues::Text(text.to_string()))
}

/// Collect the rows of a simple query into a result set.
///
/// The server renders every column as text, so `numeric`, `date`, `timestamptz`, `uuid` and
/// any other type come back without a client-side decoder.
#[must_use]
pub fn build_result_set_from_messages(messages: &[SimpleQueryMessage]) -> ResultSet {
    let mut result_set = ResultSet::with_capacity(messages.len());
    for message in messages {
        let SimpleQueryMessage::Row(row) = message else {
            continue;
        };
        if result_set.get_column_names().is_none() {
            let names = row.columns().iter().map(|c| c.name().to_string()).collect();
            result_set.set_column_names(Arc::new(names));
        }
        let values = (0..row.len())
            .map(|idx| text_value(row.get(idx)))
            .collect();
        result_set.add_row_values(values);
    }
    result_set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NIL_MARKER;

    #[test]
    fn text_values_keep_server_rendering() {
        assert_eq!(text_value(Some("12.50")), RowValues::Text("12.50".into()));
        assert_eq!(
            text_value(Some("2019-03-07 12:00:00+00")).to_field_string(),
            "2019-03-07 12:00:00+00"
        );
        assert_eq!(text_value(None).to_field_string(), NIL_MARKER);
    }

    #[test]
    fn no_messages_is_an_empty_set() {
        let rs = build_result_set_from_messages(&[]);
        assert!(rs.results.is_empty());
        assert_eq!(rs.rows_affected, 0);
    }
}
