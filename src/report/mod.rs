//! Report rendering
//!
//! - `text`: Plain-text blocks written through `ReportWriter`
//! - `forest_plot`: SVG forest plots, one per poolable outcome
//! - `json`: Machine-readable run summary

pub mod forest_plot;
pub mod json;
pub mod text;

pub use forest_plot::ForestPlot;
pub use json::JsonFormatter;
