//! Meta-Analyzer - Run orchestration
//!
//! Sequences one analysis run:
//!   load → effect sizes → grouping → pooling → rendering → charts listing
//!
//! The input table is loaded before the report file is opened, so a fatal
//! input error never truncates an earlier report. After that point, every
//! failure is confined to the outcome being processed.

use crate::config::{chart_filename, AnalysisConfig};
use crate::data::StudyData;
use crate::grouping::{group_by_outcome, ExclusionReason, OutcomeGroup, OutcomeStatus};
use crate::metrics::{attach_effect_sizes, PooledEstimate};
use crate::report::{text, ForestPlot, JsonFormatter};
use crate::utils::ReportWriter;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

/// One study in the run summary
#[derive(Debug, Clone, Serialize)]
pub struct StudySummary {
    pub author_year: String,
    pub intervention_name: String,
    pub dose_mg_per_day: Option<String>,
    pub g: f64,
    pub se_g: f64,
    /// Inverse-variance weight, set for pooled outcomes
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExcludedSummary {
    pub author_year: String,
    pub reason: ExclusionReason,
}

/// Result for one outcome
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub outcome_name: String,
    pub status: OutcomeStatus,
    pub studies: Vec<StudySummary>,
    pub excluded: Vec<ExcludedSummary>,
    pub pooled: Option<PooledEstimate>,
    /// Chart filename, when one was written
    pub chart: Option<String>,
}

impl OutcomeSummary {
    fn from_group(group: &OutcomeGroup, chart: Option<String>) -> Self {
        let weights = group.pooled.as_ref().map(|p| p.weights.as_slice());

        let studies = group
            .valid
            .iter()
            .enumerate()
            .map(|(i, r)| StudySummary {
                author_year: r.author_year.clone(),
                intervention_name: r.intervention_name.clone(),
                dose_mg_per_day: r.dose_mg_per_day.clone(),
                g: r.g().unwrap_or(f64::NAN),
                se_g: r.se_g().unwrap_or(f64::NAN),
                weight: weights.and_then(|w| w.get(i).copied()),
            })
            .collect();

        let excluded = group
            .excluded
            .iter()
            .map(|e| ExcludedSummary {
                author_year: e.record.author_year.clone(),
                reason: e.reason,
            })
            .collect();

        Self {
            outcome_name: group.outcome_name.clone(),
            status: group.status(),
            studies,
            excluded,
            pooled: group.pooled.clone(),
            chart,
        }
    }
}

/// Result of a full run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub input: String,
    pub loaded_rows: usize,
    pub cleaned_rows: usize,
    /// Every grouped outcome, including those dropped from the report
    pub outcomes: Vec<OutcomeSummary>,
    /// Chart filenames in the order they were written
    pub charts: Vec<String>,
}

impl AnalysisSummary {
    pub fn outcome(&self, name: &str) -> Option<&OutcomeSummary> {
        self.outcomes.iter().find(|o| o.outcome_name == name)
    }
}

/// Main meta-analysis coordinator
pub struct MetaAnalyzer {
    config: AnalysisConfig,
}

impl MetaAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline against the configured paths
    ///
    /// Input errors are returned before the report file is touched.
    pub fn run(&self) -> Result<AnalysisSummary> {
        let data = StudyData::load(&self.config.input_path)?;

        let mut writer = ReportWriter::create(
            &self.config.report_path,
            self.config.append_report,
            self.config.echo_console,
        )?;

        let summary = self.analyze(data, &mut writer)?;

        if let Some(path) = &self.config.summary_json {
            JsonFormatter::save(&summary, path)?;
            info!(path = %path.display(), "wrote run summary");
        }

        info!(
            report = %self.config.report_path.display(),
            charts = summary.charts.len(),
            "meta-analysis output written"
        );

        Ok(summary)
    }

    /// Analyze already-loaded data, writing the report through `writer`
    pub fn analyze(&self, mut data: StudyData, writer: &mut ReportWriter) -> Result<AnalysisSummary> {
        self.write_header(writer)?;

        writer.block(&text::format_load_summary(&data))?;
        writer.blank()?;
        writer.line(text::format_cleaning_summary(&data))?;

        // STEP 1: Effect sizes per row
        attach_effect_sizes(&mut data.records, self.config.zero_variance);

        // STEP 2: Group by outcome and keep the valid subset
        let mut groups = group_by_outcome(&data.records);

        let poolable: Vec<String> = names_with_status(&groups, OutcomeStatus::Poolable);
        writer.line(format!(
            "Outcomes with multiple studies: {}",
            text::bracket_list(&poolable)
        ))?;
        if poolable.is_empty() {
            writer.line("No outcomes with multiple valid studies found for meta-analysis!")?;
            writer.line(format!(
                "Single study outcomes available: {}",
                text::bracket_list(&names_with_status(&groups, OutcomeStatus::SingleStudy))
            ))?;
        }
        writer.blank()?;

        // STEP 3: Pool and render outcome by outcome
        let mut outcomes = Vec::with_capacity(groups.len());
        let mut charts: Vec<(String, String)> = Vec::new();

        for group in groups.iter_mut() {
            let chart = match group.status() {
                OutcomeStatus::NoValidStudies => None,
                OutcomeStatus::SingleStudy => {
                    self.write_single_study(group, writer)?;
                    None
                }
                OutcomeStatus::Poolable => self.write_pooled(group, writer)?,
            };

            if let Some(filename) = &chart {
                charts.push((group.outcome_name.clone(), filename.clone()));
            }
            outcomes.push(OutcomeSummary::from_group(group, chart));
        }

        // STEP 4: Generated charts listing
        writer.line(text::rule('='))?;
        writer.line("GENERATED CHARTS")?;
        writer.line(text::rule('='))?;
        if charts.is_empty() {
            writer.line("No charts generated")?;
        }
        for (outcome_name, filename) in &charts {
            writer.blank()?;
            writer.block(&text::format_chart_entry(outcome_name, filename))?;
        }
        writer.blank()?;
        writer.line(format!(
            "Full report saved to: {}",
            self.config.report_path.display()
        ))?;

        Ok(AnalysisSummary {
            input: data.source.display().to_string(),
            loaded_rows: data.loaded_rows,
            cleaned_rows: data.records.len(),
            outcomes,
            charts: charts.into_iter().map(|(_, filename)| filename).collect(),
        })
    }

    fn write_header(&self, writer: &mut ReportWriter) -> Result<()> {
        writer.line(text::rule('='))?;
        writer.line("META-ANALYSIS REPORT")?;
        writer.line(text::rule('='))?;
        if self.config.timestamp {
            writer.line(format!(
                "Generated: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ))?;
        }
        writer.line("Model: fixed-effect, inverse-variance weighted Hedges' g")?;
        writer.line(format!(
            "Zero-variance policy: {}",
            self.config.zero_variance.as_str()
        ))?;
        writer.blank()?;
        Ok(())
    }

    fn write_single_study(&self, group: &OutcomeGroup, writer: &mut ReportWriter) -> Result<()> {
        info!(outcome = %group.outcome_name, "single valid study, pooling skipped");

        writer.line(format!("--- Single study analysis for {} ---", group.outcome_name))?;
        writer.block(&text::format_loaded_rows(group))?;
        writer.block(&text::format_exclusions(group))?;
        writer.block(&text::format_single_study(group))?;
        writer.blank()?;
        Ok(())
    }

    /// Pool, report and chart one outcome; returns the chart filename
    fn write_pooled(
        &self,
        group: &mut OutcomeGroup,
        writer: &mut ReportWriter,
    ) -> Result<Option<String>> {
        writer.line(format!("--- Meta-analysis for {} ---", group.outcome_name))?;
        writer.block(&text::format_loaded_rows(group))?;
        writer.block(&text::format_exclusions(group))?;
        writer.blank()?;

        if group.pool().is_none() {
            warn!(outcome = %group.outcome_name, "pooling produced no estimate");
            writer.line(format!(
                "Insufficient valid data for meta-analysis of {}",
                group.outcome_name
            ))?;
            writer.blank()?;
            return Ok(None);
        }

        writer.block(&text::format_effect_sizes(group))?;
        if let Some(pooled) = &group.pooled {
            info!(
                outcome = %group.outcome_name,
                studies = pooled.n_studies(),
                pooled_g = pooled.g,
                pooled_se = pooled.se,
                "pooled outcome"
            );
            writer.block(&text::format_pooled(pooled))?;
        }

        let chart = match self.render_chart(group) {
            Ok(filename) => {
                writer.line(format!("Saved forest plot to {}", filename))?;
                Some(filename)
            }
            Err(err) => {
                warn!(outcome = %group.outcome_name, error = %err, "forest plot failed");
                writer.line(format!(
                    "Forest plot for {} could not be generated: {:#}",
                    group.outcome_name, err
                ))?;
                None
            }
        };

        writer.line("-".repeat(group.outcome_name.chars().count() + 24))?;
        writer.blank()?;
        Ok(chart)
    }

    fn render_chart(&self, group: &OutcomeGroup) -> Result<String> {
        let plot = ForestPlot::from_group(group)?;
        let path = self.config.chart_path(&group.outcome_name);
        plot.save(&path)
            .with_context(|| format!("rendering chart for '{}'", group.outcome_name))?;
        info!(path = %path.display(), "saved forest plot");

        Ok(chart_filename(&self.config.chart_prefix, &group.outcome_name))
    }
}

fn names_with_status(groups: &[OutcomeGroup], status: OutcomeStatus) -> Vec<String> {
    groups
        .iter()
        .filter(|g| g.status() == status)
        .map(|g| g.outcome_name.clone())
        .collect()
}
