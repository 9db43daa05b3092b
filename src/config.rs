//! Run Configuration
//!
//! Paths, chart naming and statistical policy for one analysis run.
//! Values come from an optional JSON file and are then overridden by CLI flags.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default input table written by the extraction stage
pub const DEFAULT_INPUT: &str = "_extracted_datapoints.csv";

/// Default text report
pub const DEFAULT_REPORT: &str = "_meta_analysis_output.txt";

/// Default chart filename prefix
pub const DEFAULT_CHART_PREFIX: &str = "_meta_analysis";

/// Handling of rows whose pooled standard deviation is exactly zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// g = 0 with se_g = 0 (zero effect, zero uncertainty)
    #[default]
    ZeroEffect,
    /// g and se_g are undefined (NaN); the row is reported as excluded
    Exclude,
}

impl ZeroVariancePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ZeroEffect => "zero_effect",
            Self::Exclude => "exclude",
        }
    }
}

/// Configuration for a single meta-analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Input table (CSV, or Parquet when the extension is `.parquet`)
    pub input_path: PathBuf,

    /// Text report path
    pub report_path: PathBuf,

    /// Directory that receives the forest plots
    pub output_dir: PathBuf,

    /// Chart filenames are `<prefix>_forest_<outcome>.svg`
    pub chart_prefix: String,

    pub zero_variance: ZeroVariancePolicy,

    /// Append to an existing report instead of truncating it
    pub append_report: bool,

    /// Mirror every report line to stdout
    pub echo_console: bool,

    /// Write a generation timestamp into the report header
    pub timestamp: bool,

    /// Optional machine-readable summary
    pub summary_json: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT),
            report_path: PathBuf::from(DEFAULT_REPORT),
            output_dir: PathBuf::from("."),
            chart_prefix: DEFAULT_CHART_PREFIX.to_string(),
            zero_variance: ZeroVariancePolicy::default(),
            append_report: false,
            echo_console: true,
            timestamp: true,
            summary_json: None,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from JSON file
    ///
    /// Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path))
    }

    /// Chart path for an outcome
    ///
    /// Derived directly from the outcome name so repeated runs overwrite the
    /// same file, and distinct outcome names never share one.
    pub fn chart_path(&self, outcome_name: &str) -> PathBuf {
        self.output_dir.join(chart_filename(&self.chart_prefix, outcome_name))
    }
}

/// `<prefix>_forest_<outcome_name>.svg`
///
/// `%`, path separators and control characters are percent-encoded, so the
/// chart stays inside `output_dir` and the mapping is one-to-one.
pub fn chart_filename(prefix: &str, outcome_name: &str) -> String {
    let mut safe = String::with_capacity(outcome_name.len());
    for c in outcome_name.chars() {
        if matches!(c, '%' | '/' | '\\') || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                safe.push_str(&format!("%{:02X}", byte));
            }
        } else {
            safe.push(c);
        }
    }
    format!("{}_forest_{}.svg", prefix, safe)
}
