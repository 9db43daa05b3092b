//! Fatal input conditions
//!
//! Everything that stops a run before any report is written. Row-level and
//! outcome-level problems never surface here; they are skipped and logged.

use std::path::PathBuf;
use thiserror::Error;

/// The input table cannot supply any usable study rows
#[derive(Debug, Error)]
pub enum DataUnavailable {
    #[error("input table not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read input table {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: polars::prelude::PolarsError,
    },

    #[error("input table {} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("no complete rows remain in {} after cleaning ({loaded} loaded)", path.display())]
    NoCompleteRows { path: PathBuf, loaded: usize },
}

impl DataUnavailable {
    /// Path of the offending input table
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotFound { path }
            | Self::Unreadable { path, .. }
            | Self::MissingColumn { path, .. }
            | Self::NoCompleteRows { path, .. } => path,
        }
    }
}
