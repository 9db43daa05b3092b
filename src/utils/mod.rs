//! Utility modules for the meta-analysis pipeline
//!
//! Contains shared functionality used across multiple stages:
//! - Numeric coercion: Explicit tagged parsing of table cells
//! - Frame helpers: Column validation and string extraction for Polars frames
//! - Report writer: Tee output to console and report file

pub mod frame_helpers;
pub mod numeric;
pub mod report_writer;

// Re-export commonly used types
pub use frame_helpers::{require_columns, string_cells};
pub use numeric::{parse_numeric, NumericCell};
pub use report_writer::ReportWriter;
