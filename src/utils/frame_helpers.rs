//! DataFrame helpers with column validation
//!
//! Provides safe, explicit patterns for pulling cells out of Polars frames
//! regardless of the dtype the reader inferred.

use polars::prelude::*;
use std::collections::HashSet;

/// First required column absent from the frame, if any
///
/// # Example
/// ```rust,ignore
/// if let Some(column) = require_columns(&df, &["outcome_name", "author_year"]) {
///     // report the missing column
/// }
/// ```
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Option<String> {
    let actual_cols: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    columns
        .iter()
        .find(|&&expected| !actual_cols.contains(expected))
        .map(|s| s.to_string())
}

/// Read a column as optional strings, one per row
///
/// Typed columns (Parquet input) are cast to text first so every input
/// format goes through the same coercion path.
pub fn string_cells(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    let values = column.str()?;

    Ok(values
        .into_iter()
        .map(|opt| opt.map(|s| s.to_string()))
        .collect())
}
