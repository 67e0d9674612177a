//! Size-bounded grouped averaging for chart payloads
//!
//! Rows are split into consecutive groups of `factor` rows in their original
//! order and each group collapses into one row holding the mean timestamp
//! (truncated to whole seconds) and the mean of every value column. A short
//! final group averages only the rows it actually has.
//!
//! Grouping is positional: with unevenly spaced input, groups do not cover
//! equal time intervals.

use crate::types::Row;
use std::mem::size_of;

/// Estimated in-memory size of `rows` in bytes
pub fn estimate_size(row_count: usize, column_count: usize) -> usize {
    row_count * (size_of::<i64>() + column_count * size_of::<f64>())
}

/// Reduction factor for a batch: `round(estimated_size / size_budget)`
///
/// A zero budget disables averaging (factor 1).
pub fn reduction_factor(row_count: usize, column_count: usize, size_budget: usize) -> usize {
    if size_budget == 0 {
        return 1;
    }
    let estimated = estimate_size(row_count, column_count) as f64;
    (estimated / size_budget as f64).round() as usize
}

/// Reduce `rows` so their estimated size stays near `size_budget`
///
/// Returns the input unchanged when the factor is 1 or less.
pub fn reduce(rows: Vec<Row>, column_count: usize, size_budget: usize) -> Vec<Row> {
    let factor = reduction_factor(rows.len(), column_count, size_budget);
    if factor <= 1 {
        log::trace!("No data average computation needed ({} rows)", rows.len());
        return rows;
    }
    log::debug!("Averaging {} rows by factor {}", rows.len(), factor);
    reduce_by_factor(rows, factor)
}

/// Average consecutive groups of `factor` rows
pub fn reduce_by_factor(rows: Vec<Row>, factor: usize) -> Vec<Row> {
    if factor <= 1 {
        return rows;
    }
    rows.chunks(factor).map(average_group).collect()
}

fn average_group(group: &[Row]) -> Row {
    let count = group.len();
    let columns = group.iter().map(|row| row.values.len()).max().unwrap_or(0);

    let ts_sum: i128 = group.iter().map(|row| i128::from(row.timestamp)).sum();
    let timestamp = (ts_sum / count as i128) as i64;

    let values = (0..columns)
        .map(|col| {
            // rows shorter than the widest one count as missing for that column
            let present: Vec<f64> = group
                .iter()
                .filter_map(|row| row.values.get(col).copied())
                .filter(|v| !v.is_nan())
                .collect();
            if present.is_empty() {
                f64::NAN
            } else {
                present.iter().sum::<f64>() / present.len() as f64
            }
        })
        .collect();

    Row::new(timestamp, values)
}
