// Meta-Analysis Binary Entry Point
//
// Purpose: Pool the extracted study table and write the report and forest plots
// Usage: cargo run --release --bin run_meta_analysis -- --input _extracted_datapoints.csv

use anyhow::Result;
use clap::Parser;
use meta_analysis_rust::{AnalysisConfig, MetaAnalyzer, ZeroVariancePolicy};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "run_meta_analysis",
    version,
    about = "Fixed-effect meta-analysis of extracted study data with forest plots"
)]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long, env = "META_ANALYSIS_CONFIG")]
    config: Option<PathBuf>,

    /// Input table (CSV or .parquet)
    #[arg(long, env = "META_ANALYSIS_INPUT")]
    input: Option<PathBuf>,

    /// Text report path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Directory for forest plot files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Chart filename prefix
    #[arg(long)]
    chart_prefix: Option<String>,

    /// Handling of rows with zero pooled standard deviation
    #[arg(long, value_enum)]
    zero_variance: Option<ZeroVariancePolicy>,

    /// Append to the report instead of replacing it
    #[arg(long, default_value_t = false)]
    append: bool,

    /// Do not mirror report lines to stdout
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Omit the generation timestamp from the report
    #[arg(long, default_value_t = false)]
    no_timestamp: bool,

    /// Also write a JSON summary of all outcomes
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(input) = self.input {
            config.input_path = input;
        }
        if let Some(report) = self.report {
            config.report_path = report;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(prefix) = self.chart_prefix {
            config.chart_prefix = prefix;
        }
        if let Some(policy) = self.zero_variance {
            config.zero_variance = policy;
        }
        if self.summary_json.is_some() {
            config.summary_json = self.summary_json;
        }
        config.append_report |= self.append;
        config.echo_console &= !self.quiet;
        config.timestamp &= !self.no_timestamp;

        Ok(config)
    }
}

fn main() {
    // Initialize tracing (structured logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meta_analysis_rust=info,run_meta_analysis=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    if let Err(err) = run() {
        tracing::error!(error = %err, "meta-analysis failed");
        for cause in err.chain().skip(1) {
            tracing::error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = Cli::parse().into_config()?;

    tracing::info!("Configuration:");
    tracing::info!("  Input: {}", config.input_path.display());
    tracing::info!("  Report: {}", config.report_path.display());
    tracing::info!("  Charts: {}", config.output_dir.display());
    tracing::info!("  Zero-variance policy: {}", config.zero_variance.as_str());

    let summary = MetaAnalyzer::new(config).run()?;

    let pooled = summary
        .outcomes
        .iter()
        .filter(|o| o.pooled.is_some())
        .count();
    tracing::info!(
        "Pooled {} of {} outcomes, {} chart(s) written",
        pooled,
        summary.outcomes.len(),
        summary.charts.len()
    );

    Ok(())
}
