//! Splitting a large row set into statements that stay under a payload ceiling.

use std::ops::Range;

use crate::types::Row;

/// Default byte ceiling for one generated statement.
pub const PAYLOAD_CEILING: usize = 10_000_000;
/// Multiplier applied to the raw field bytes to cover quoting, escaping and protocol overhead.
pub const SAFETY_FACTOR: usize = 8;

/// Sum of the byte length of every field in every row.
#[must_use]
pub fn estimate_bytes<'a>(rows: impl IntoIterator<Item = &'a Row>) -> usize {
    rows.into_iter()
        .flat_map(|row| row.iter())
        .map(String::len)
        .sum()
}

/// Number of pieces the payload must be split into: `ceil(total * safety / ceiling)`, at least 1.
#[must_use]
pub fn chunk_divisor(total_bytes: usize, safety_factor: usize, payload_ceiling: usize) -> usize {
    let scaled = total_bytes.saturating_mul(safety_factor);
    scaled.div_ceil(payload_ceiling.max(1)).max(1)
}

/// Rows per statement for a set of `row_count` rows. Never 0.
#[must_use]
pub fn chunk_size(row_count: usize, divisor: usize) -> usize {
    (row_count / divisor.max(1)).max(1)
}

/// Contiguous ranges of `chunk` rows covering `0..row_count` in order; the last may be short.
#[must_use]
pub fn chunk_ranges(row_count: usize, chunk: usize) -> Vec<Range<usize>> {
    let chunk = chunk.max(1);
    (0..row_count)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(row_count))
        .collect()
}

/// Plan the chunk ranges for `rows`.
#[must_use]
pub fn plan_chunks(rows: &[Row], safety_factor: usize, payload_ceiling: usize) -> Vec<Range<usize>> {
    if rows.is_empty() {
        return Vec::new();
    }
    let divisor = chunk_divisor(estimate_bytes(rows), safety_factor, payload_ceiling);
    chunk_ranges(rows.len(), chunk_size(rows.len(), divisor))
}
