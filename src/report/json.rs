use crate::analyzer::AnalysisSummary;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Machine-readable run summary (`--summary-json`)
pub struct JsonFormatter;

impl JsonFormatter {
    /// Indented JSON, one outcome object per entry
    pub fn format(summary: &AnalysisSummary) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(summary)
    }

    pub fn save(summary: &AnalysisSummary, path: &Path) -> Result<()> {
        let json = Self::format(summary).context("Failed to serialize run summary")?;
        fs::write(path, json).with_context(|| format!("Failed to write summary JSON: {:?}", path))
    }
}
