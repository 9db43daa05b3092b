//! Pipeline Integration Tests
//!
//! Runs the full pipeline from an input table on disk to the text report,
//! forest plots and JSON summary, inside temporary directories.

use meta_analysis_rust::grouping::{ExclusionReason, OutcomeStatus};
use meta_analysis_rust::{AnalysisConfig, DataUnavailable, MetaAnalyzer, ZeroVariancePolicy};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const HEADER: &str = "outcome_name,author_year,intervention_name,dose_mg_per_day,\
sample_size_intervention,sample_size_control,intervention_post_mean,intervention_post_sd,\
control_post_mean,control_post_sd,country,p_value";

const ROWS: &str = "\
LDL_cholesterol,Smith 2020,Berberine,500,33,31,140.80,39.74,161.13,53.16,China,0.04
LDL_cholesterol,Lee 2021,Berberine,1000,20,22,118.2,30.1,131.0,28.4,Korea,0.12
LDL_cholesterol,Garcia 2022,Berberine,900,45,44,125.5,25.0,129.9,27.2,Spain,
HDL_cholesterol,Smith 2020,Berberine,500,33,31,48.1,9.2,46.3,10.1,China,0.3
CRP,Chen 2019,Berberine,500,18,18,2.0,0.0,2.0,0.0,China,
fasting_glucose,Wu 2018,Berberine,1500,40,40,NA,1.1,6.1,1.0,China,
fasting_glucose,Patel 2020,Berberine,1000,30,30,5.6,0.9,not reported,1.0,India,
";

fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("_extracted_datapoints.csv");
    fs::write(&path, format!("{}\n{}", HEADER, ROWS)).unwrap();
    path
}

fn config(dir: &Path, input: PathBuf) -> AnalysisConfig {
    AnalysisConfig {
        input_path: input,
        report_path: dir.join("_meta_analysis_output.txt"),
        output_dir: dir.join("charts"),
        echo_console: false,
        timestamp: false,
        ..AnalysisConfig::default()
    }
}

fn chart_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn test_full_run_writes_report_and_charts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let config = config(dir.path(), input);

    let summary = MetaAnalyzer::new(config.clone()).run().unwrap();

    assert_eq!(summary.loaded_rows, 7);
    assert_eq!(summary.cleaned_rows, 5);

    let report = fs::read_to_string(&config.report_path).unwrap();
    assert!(report.contains("Successfully loaded 7 rows from _extracted_datapoints.csv"));
    assert!(report.contains("After cleaning missing values: 5 rows remaining (2 dropped)"));
    assert!(report.contains("Outcomes with multiple studies: [LDL_cholesterol]"));
    assert!(report.contains("--- Meta-analysis for LDL_cholesterol ---"));
    assert!(report.contains("Pooled SMD (Hedges' g): "));
    assert!(report.contains("95% CI: ["));
    assert!(report.contains("--- Single study analysis for HDL_cholesterol ---"));

    // Zero-variance outcome has no valid study: no report section, no chart
    assert!(!report.contains("analysis for CRP"));
    assert_eq!(
        summary.outcome("CRP").unwrap().status,
        OutcomeStatus::NoValidStudies
    );

    // Charts listing closes the report
    let charts_at = report.find("GENERATED CHARTS").unwrap();
    let ldl_at = report.find("--- Meta-analysis for LDL_cholesterol ---").unwrap();
    assert!(charts_at > ldl_at);
    assert!(report[charts_at..].contains("Chart: Forest Plot - LDL cholesterol"));
    assert!(report[charts_at..].contains("Filename: _meta_analysis_forest_LDL_cholesterol.svg"));
    assert!(report
        .trim_end()
        .ends_with(&format!("Full report saved to: {}", config.report_path.display())));

    assert_eq!(
        chart_files(&config.output_dir),
        vec!["_meta_analysis_forest_LDL_cholesterol.svg"]
    );
    let svg =
        fs::read_to_string(config.output_dir.join("_meta_analysis_forest_LDL_cholesterol.svg"))
            .unwrap();
    assert!(svg.contains("Forest Plot for LDL cholesterol"));
    assert!(svg.contains("Garcia 2022"));
}

#[test]
fn test_pooled_estimate_is_bounded_and_weighted() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());

    let summary = MetaAnalyzer::new(config(dir.path(), input)).run().unwrap();
    let ldl = summary.outcome("LDL_cholesterol").unwrap();
    let pooled = ldl.pooled.as_ref().unwrap();

    let min = ldl.studies.iter().map(|s| s.g).fold(f64::INFINITY, f64::min);
    let max = ldl.studies.iter().map(|s| s.g).fold(f64::NEG_INFINITY, f64::max);
    assert!(min <= pooled.g && pooled.g <= max);

    for study in &ldl.studies {
        let weight = study.weight.unwrap();
        assert!((weight - 1.0 / study.se_g.powi(2)).abs() <= 1e-9 * weight);
    }
    assert!(pooled.se < ldl.studies.iter().map(|s| s.se_g).fold(f64::INFINITY, f64::min));

    // Single-study outcomes never carry a pooled estimate
    let hdl = summary.outcome("HDL_cholesterol").unwrap();
    assert_eq!(hdl.status, OutcomeStatus::SingleStudy);
    assert!(hdl.pooled.is_none());
    assert!(hdl.chart.is_none());
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let config = config(dir.path(), input);
    let chart = config.output_dir.join("_meta_analysis_forest_LDL_cholesterol.svg");

    let first = MetaAnalyzer::new(config.clone()).run().unwrap();
    let first_report = fs::read_to_string(&config.report_path).unwrap();
    let first_chart = fs::read(&chart).unwrap();

    let second = MetaAnalyzer::new(config.clone()).run().unwrap();
    let second_report = fs::read_to_string(&config.report_path).unwrap();
    let second_chart = fs::read(&chart).unwrap();

    assert_eq!(first_report, second_report);
    assert_eq!(first_chart, second_chart);
    assert_eq!(chart_files(&config.output_dir).len(), 1);

    let a = first.outcome("LDL_cholesterol").unwrap().pooled.clone().unwrap();
    let b = second.outcome("LDL_cholesterol").unwrap().pooled.clone().unwrap();
    assert_eq!(a.g.to_bits(), b.g.to_bits());
    assert_eq!(a.se.to_bits(), b.se.to_bits());
}

#[test]
fn test_missing_input_is_fatal_and_leaves_report_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), dir.path().join("absent.csv"));
    fs::write(&config.report_path, "earlier report\n").unwrap();

    let err = MetaAnalyzer::new(config.clone()).run().unwrap_err();
    let cause = err.downcast_ref::<DataUnavailable>().unwrap();
    assert!(matches!(cause, DataUnavailable::NotFound { .. }));

    assert_eq!(
        fs::read_to_string(&config.report_path).unwrap(),
        "earlier report\n"
    );
    assert!(chart_files(&config.output_dir).is_empty());
}

#[test]
fn test_missing_input_creates_no_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), dir.path().join("absent.csv"));

    assert!(MetaAnalyzer::new(config.clone()).run().is_err());
    assert!(!config.report_path.exists());
}

#[test]
fn test_exclude_policy_reports_zero_variance_as_undefined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.csv");
    fs::write(
        &path,
        format!(
            "{}\n\
             ALT,A 2019,Silymarin,420,30,30,20,5,25,5,,\n\
             ALT,B 2020,Silymarin,420,30,30,22,6,24,6,,\n\
             ALT,C 2021,Silymarin,420,30,30,22,0,22,0,,\n",
            HEADER
        ),
    )
    .unwrap();

    let mut cfg = config(dir.path(), path);
    cfg.zero_variance = ZeroVariancePolicy::Exclude;
    let summary = MetaAnalyzer::new(cfg.clone()).run().unwrap();

    let alt = summary.outcome("ALT").unwrap();
    assert_eq!(alt.studies.len(), 2);
    assert_eq!(alt.excluded[0].reason, ExclusionReason::NonFiniteStandardError);

    let report = fs::read_to_string(&cfg.report_path).unwrap();
    assert!(report.contains("Zero-variance policy: exclude"));
    assert!(report.contains("Excluded: C 2021 (non-finite standard error)"));
}

#[test]
fn test_summary_json_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let mut cfg = config(dir.path(), input);
    cfg.summary_json = Some(dir.path().join("summary.json"));

    MetaAnalyzer::new(cfg.clone()).run().unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(value["loaded_rows"], 7);
    assert_eq!(value["charts"][0], "_meta_analysis_forest_LDL_cholesterol.svg");
    assert_eq!(value["outcomes"][0]["status"], "poolable");
}

#[test]
fn test_parquet_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("datapoints.parquet");

    let mut df = df![
        "outcome_name" => &["ALT", "ALT"],
        "author_year" => &["A 2019", "B 2020"],
        "intervention_name" => &["Silymarin", "Silymarin"],
        "dose_mg_per_day" => &["420", "420"],
        "sample_size_intervention" => &[30i64, 25],
        "sample_size_control" => &[30i64, 26],
        "intervention_post_mean" => &[20.0, 22.0],
        "intervention_post_sd" => &[5.0, 6.0],
        "control_post_mean" => &[25.0, 24.0],
        "control_post_sd" => &[5.0, 6.0],
    ]
    .unwrap();
    let file = fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();

    let summary = MetaAnalyzer::new(config(dir.path(), path)).run().unwrap();
    assert_eq!(summary.cleaned_rows, 2);
    assert!(summary.outcome("ALT").unwrap().pooled.is_some());
}

#[test]
fn test_outcome_names_are_not_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.csv");
    fs::write(
        &path,
        format!(
            "{}\n\
             LDL,A 2019,Berberine,500,30,30,120,20,130,20,,\n\
             ldl,B 2020,Berberine,500,30,30,118,22,131,21,,\n",
            HEADER
        ),
    )
    .unwrap();

    let summary = MetaAnalyzer::new(config(dir.path(), path)).run().unwrap();
    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary.outcomes.iter().all(|o| o.pooled.is_none()));
    assert!(summary.charts.is_empty());
}

#[test]
fn test_outcomes_with_similar_names_get_separate_charts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.csv");
    fs::write(
        &path,
        format!(
            "{}\n\
             HbA1c/fasting,A 2019,Cinnamon,1000,30,30,6.9,0.8,7.2,0.9,,\n\
             HbA1c/fasting,B 2020,Cinnamon,1000,25,26,7.0,0.7,7.1,0.8,,\n\
             HbA1c_fasting,C 2019,Cinnamon,500,40,40,6.8,0.9,7.0,0.9,,\n\
             HbA1c_fasting,D 2021,Cinnamon,500,35,33,6.7,1.0,7.1,1.1,,\n",
            HEADER
        ),
    )
    .unwrap();

    let config = config(dir.path(), path);
    let summary = MetaAnalyzer::new(config.clone()).run().unwrap();

    assert_eq!(summary.charts.len(), 2);
    assert_ne!(summary.charts[0], summary.charts[1]);
    assert_eq!(chart_files(&config.output_dir).len(), summary.charts.len());

    let slash = fs::read_to_string(config.output_dir.join(&summary.charts[0])).unwrap();
    let underscore = fs::read_to_string(config.output_dir.join(&summary.charts[1])).unwrap();
    assert!(slash.contains("A 2019") && !slash.contains("C 2019"));
    assert!(underscore.contains("C 2019") && !underscore.contains("A 2019"));
}
