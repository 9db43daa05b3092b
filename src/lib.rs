//! Meta-Analysis Rust Implementation
//!
//! Evidence synthesis over a cleaned table of per-study clinical measurements
//! (intervention vs. control arms).
//!
//! Pipeline layout:
//! - `data`: Loading and cleaning the input table with Polars
//! - `metrics/`: Hedges' g effect sizes and fixed-effect pooling
//! - `grouping`: Outcome grouping and validity filtering
//! - `report/`: Text report blocks, forest plots and JSON summary
//! - `analyzer`: Run orchestration
//!
//! Execution is single-threaded and sequential. Only a missing or unreadable
//! input table aborts a run; every other failure is confined to its outcome.

pub mod analyzer;
pub mod config;
pub mod data;
pub mod error;
pub mod grouping;
pub mod metrics;
pub mod report;
pub mod utils;

// Re-export commonly used types
pub use analyzer::{AnalysisSummary, MetaAnalyzer};
pub use config::{AnalysisConfig, ZeroVariancePolicy};
pub use data::{StudyData, StudyRecord};
pub use error::DataUnavailable;
pub use grouping::{group_by_outcome, OutcomeGroup, OutcomeStatus};
pub use metrics::{calculate_hedges_g, pool_fixed_effect, EffectSize, PooledEstimate};
pub use utils::ReportWriter;
