//! Data Loading and Cleaning
//!
//! Loads the extracted study table using Polars, coerces the essential numeric
//! columns through `parse_numeric`, and drops rows missing any essential value.
//!
//! Input formats:
//!   - CSV (default): every column read as text, no schema inference
//!   - Parquet (`.parquet`): typed columns, cast to text before coercion

use crate::error::DataUnavailable;
use crate::metrics::EffectSize;
use crate::utils::{parse_numeric, require_columns, string_cells, NumericCell};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Descriptive columns every row must carry
pub const DESCRIPTIVE_COLUMNS: [&str; 4] = [
    "outcome_name",
    "author_year",
    "intervention_name",
    "dose_mg_per_day",
];

/// Numeric columns a row needs for an effect size
pub const ESSENTIAL_COLUMNS: [&str; 6] = [
    "sample_size_intervention",
    "sample_size_control",
    "intervention_post_mean",
    "intervention_post_sd",
    "control_post_mean",
    "control_post_sd",
];

/// One input row after coercion, before the drop decision
#[derive(Debug, Clone)]
pub struct RawStudyRow {
    pub outcome_name: Option<String>,
    pub author_year: Option<String>,
    pub intervention_name: Option<String>,
    pub dose_mg_per_day: Option<String>,
    /// Cells in `ESSENTIAL_COLUMNS` order
    pub essentials: [NumericCell; 6],
    pub extras: BTreeMap<String, String>,
}

impl RawStudyRow {
    /// Row-drop predicate: every essential cell parsed to a value
    pub fn is_complete(&self) -> bool {
        self.essentials.iter().all(|cell| !cell.is_missing())
    }

    /// Convert to a record, or `None` if any essential value is missing
    pub fn into_record(self) -> Option<StudyRecord> {
        let [n1, n2, m1, sd1, m2, sd2] = self.essentials;

        Some(StudyRecord {
            outcome_name: self.outcome_name.unwrap_or_default(),
            author_year: self.author_year.unwrap_or_default(),
            intervention_name: self.intervention_name.unwrap_or_default(),
            dose_mg_per_day: self.dose_mg_per_day,
            n_intervention: n1.value()?,
            n_control: n2.value()?,
            intervention_post_mean: m1.value()?,
            intervention_post_sd: sd1.value()?,
            control_post_mean: m2.value()?,
            control_post_sd: sd2.value()?,
            extras: self.extras,
            effect: None,
        })
    }
}

/// One cleaned study row
///
/// Immutable after cleaning except for `effect`, attached by the calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyRecord {
    pub outcome_name: String,
    pub author_year: String,
    pub intervention_name: String,
    pub dose_mg_per_day: Option<String>,
    pub n_intervention: f64,
    pub n_control: f64,
    pub intervention_post_mean: f64,
    pub intervention_post_sd: f64,
    pub control_post_mean: f64,
    pub control_post_sd: f64,
    /// Pass-through descriptive columns (country, population_type, ...)
    pub extras: BTreeMap<String, String>,
    /// Hedges' g and its standard error
    pub effect: Option<EffectSize>,
}

impl StudyRecord {
    /// Both arms have at least two participants (degrees of freedom > 0)
    pub fn has_valid_sample_sizes(&self) -> bool {
        self.n_intervention >= 2.0 && self.n_control >= 2.0
    }

    /// Valid for pooling: n ≥ 2 in both arms and a finite, positive se_g
    pub fn is_statistically_valid(&self) -> bool {
        self.has_valid_sample_sizes()
            && self
                .effect
                .map_or(false, |e| e.se_g.is_finite() && e.se_g > 0.0)
    }

    pub fn g(&self) -> Option<f64> {
        self.effect.map(|e| e.g)
    }

    pub fn se_g(&self) -> Option<f64> {
        self.effect.map(|e| e.se_g)
    }
}

/// Cleaned study table plus what was seen before cleaning
#[derive(Debug, Clone)]
pub struct StudyData {
    pub source: PathBuf,
    pub columns: Vec<String>,
    /// Rows parsed from the table, before dropping incomplete ones
    pub loaded_rows: usize,
    /// Distinct outcome names across all loaded rows, first-appearance order
    pub loaded_outcomes: Vec<String>,
    /// Distinct author/year labels across all loaded rows, first-appearance order
    pub loaded_studies: Vec<String>,
    pub records: Vec<StudyRecord>,
}

impl StudyData {
    /// Load and clean the input table
    ///
    /// Fails if the file is missing, unreadable, lacks a required column,
    /// or has no complete rows.
    pub fn load(path: &Path) -> Result<Self, DataUnavailable> {
        if !path.exists() {
            return Err(DataUnavailable::NotFound {
                path: path.to_path_buf(),
            });
        }

        let df = read_frame(path).map_err(|source| DataUnavailable::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let required: Vec<&str> = DESCRIPTIVE_COLUMNS
            .iter()
            .chain(ESSENTIAL_COLUMNS.iter())
            .copied()
            .collect();
        if let Some(column) = require_columns(&df, &required) {
            return Err(DataUnavailable::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }

        let rows = extract_rows(&df, &columns).map_err(|source| DataUnavailable::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let loaded_rows = rows.len();
        info!(rows = loaded_rows, path = %path.display(), "loaded input table");

        let data = Self::from_rows(path, columns, rows);
        info!(
            rows = data.records.len(),
            dropped = loaded_rows - data.records.len(),
            "cleaned missing essential values"
        );

        if data.records.is_empty() {
            return Err(DataUnavailable::NoCompleteRows {
                path: path.to_path_buf(),
                loaded: loaded_rows,
            });
        }

        Ok(data)
    }

    /// Build from already-coerced rows, dropping incomplete ones
    pub fn from_rows(source: &Path, columns: Vec<String>, rows: Vec<RawStudyRow>) -> Self {
        let loaded_rows = rows.len();
        let loaded_outcomes = distinct(rows.iter().filter_map(|r| r.outcome_name.as_deref()));
        let loaded_studies = distinct(rows.iter().filter_map(|r| r.author_year.as_deref()));

        let records: Vec<StudyRecord> = rows
            .into_iter()
            .filter(RawStudyRow::is_complete)
            .filter_map(RawStudyRow::into_record)
            .collect();

        debug!(kept = records.len(), total = loaded_rows, "row-drop predicate applied");

        Self {
            source: source.to_path_buf(),
            columns,
            loaded_rows,
            loaded_outcomes,
            loaded_studies,
            records,
        }
    }

    pub fn dropped_rows(&self) -> usize {
        self.loaded_rows - self.records.len()
    }
}

/// Read the raw frame, choosing the reader by extension
fn read_frame(path: &Path) -> PolarsResult<DataFrame> {
    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("parquet"));

    if is_parquet {
        LazyFrame::scan_parquet(path, Default::default())?.collect()
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // Every column as text
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
    }
}

/// Pull every row out of the frame as a `RawStudyRow`
fn extract_rows(df: &DataFrame, columns: &[String]) -> PolarsResult<Vec<RawStudyRow>> {
    let outcome = string_cells(df, "outcome_name")?;
    let author = string_cells(df, "author_year")?;
    let intervention = string_cells(df, "intervention_name")?;
    let dose = string_cells(df, "dose_mg_per_day")?;

    let essentials = ESSENTIAL_COLUMNS
        .iter()
        .map(|name| string_cells(df, name))
        .collect::<PolarsResult<Vec<_>>>()?;

    let extra_names: Vec<&String> = columns
        .iter()
        .filter(|c| {
            !DESCRIPTIVE_COLUMNS.contains(&c.as_str()) && !ESSENTIAL_COLUMNS.contains(&c.as_str())
        })
        .collect();
    let extras = extra_names
        .iter()
        .map(|name| string_cells(df, name))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let cells: [NumericCell; 6] =
            std::array::from_fn(|col| parse_numeric(essentials[col][idx].as_deref()));

        let row_extras: BTreeMap<String, String> = extra_names
            .iter()
            .zip(extras.iter())
            .filter_map(|(name, values)| {
                values[idx]
                    .as_ref()
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();

        rows.push(RawStudyRow {
            outcome_name: outcome[idx].clone(),
            author_year: author[idx].clone(),
            intervention_name: intervention[idx].clone(),
            dose_mg_per_day: dose[idx].clone(),
            essentials: cells,
            extras: row_extras,
        });
    }

    Ok(rows)
}

/// Distinct values in first-appearance order
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = rustc_hash::FxHashSet::default();
    values
        .filter(|v| seen.insert(*v))
        .map(|v| v.to_string())
        .collect()
}
