//! Text report blocks
//!
//! Pure formatting helpers. Each returns a (possibly multi-line) string that
//! the orchestrator writes through `ReportWriter::block`, so every line is
//! mirrored to the console.

use crate::data::StudyData;
use crate::grouping::OutcomeGroup;
use crate::metrics::PooledEstimate;

/// Width of section rules
pub const RULE_WIDTH: usize = 50;

/// Outcome names use underscores as word separators
pub fn display_name(outcome_name: &str) -> String {
    outcome_name.replace('_', " ")
}

/// `[a, b, c]`
pub fn bracket_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

pub fn rule(ch: char) -> String {
    ch.to_string().repeat(RULE_WIDTH)
}

/// Rows, columns, outcomes and studies as loaded, before cleaning
pub fn format_load_summary(data: &StudyData) -> String {
    let file = data
        .source
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| data.source.display().to_string());

    let mut text = String::with_capacity(512);
    text.push_str(&format!(
        "Successfully loaded {} rows from {}\n",
        data.loaded_rows, file
    ));
    text.push_str(&format!("Columns: {}\n", bracket_list(&data.columns)));
    text.push_str(&format!(
        "Outcomes available: {}\n",
        bracket_list(&data.loaded_outcomes)
    ));
    text.push_str(&format!("Studies: {}\n", bracket_list(&data.loaded_studies)));
    text
}

pub fn format_cleaning_summary(data: &StudyData) -> String {
    format!(
        "After cleaning missing values: {} rows remaining ({} dropped)",
        data.records.len(),
        data.dropped_rows()
    )
}

/// Left-aligned fixed-width table with a header rule
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render(headers.to_vec()));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );

    for row in rows {
        lines.push(render(row.iter().map(String::as_str).collect()));
    }

    lines.join("\n")
}

fn fmt_number(value: f64) -> String {
    // Sample sizes are whole numbers in practice
    if value.fract() == 0.0 && value.abs() < 1e9 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn fmt_effect(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.4}", v),
        Some(v) => format!("{}", v),
        None => "-".to_string(),
    }
}

fn label(text: &str) -> String {
    if text.is_empty() {
        "(unlabelled)".to_string()
    } else {
        text.to_string()
    }
}

/// Every cleaned row of the outcome with its raw post-treatment values
pub fn format_loaded_rows(group: &OutcomeGroup) -> String {
    let rows: Vec<Vec<String>> = group
        .records
        .iter()
        .map(|r| {
            vec![
                label(&r.author_year),
                fmt_number(r.n_intervention),
                fmt_number(r.n_control),
                fmt_number(r.intervention_post_mean),
                fmt_number(r.intervention_post_sd),
                fmt_number(r.control_post_mean),
                fmt_number(r.control_post_sd),
            ]
        })
        .collect();

    format_table(
        &[
            "author_year",
            "n_int",
            "n_ctl",
            "intervention_post_mean",
            "intervention_post_sd",
            "control_post_mean",
            "control_post_sd",
        ],
        &rows,
    )
}

/// Per-study effect sizes of the valid subset, with pooling weights when pooled
pub fn format_effect_sizes(group: &OutcomeGroup) -> String {
    let shares = group.pooled.as_ref().map(PooledEstimate::relative_weights);

    let rows: Vec<Vec<String>> = group
        .valid
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut row = vec![
                label(&r.author_year),
                r.intervention_name.clone(),
                r.dose_mg_per_day.clone().unwrap_or_else(|| "-".to_string()),
                fmt_effect(r.g()),
                fmt_effect(r.se_g()),
            ];
            if let Some(shares) = &shares {
                row.push(format!("{:.1}%", shares[i] * 100.0));
            }
            row
        })
        .collect();

    let mut headers = vec!["author_year", "intervention_name", "dose_mg_per_day", "g", "se_g"];
    if shares.is_some() {
        headers.push("weight");
    }

    format_table(&headers, &rows)
}

/// Pooled estimate to three decimals
pub fn format_pooled(pooled: &PooledEstimate) -> String {
    format!(
        "Pooled SMD (Hedges' g): {:.3}\n\
         Standard Error of Pooled SMD: {:.3}\n\
         95% CI: [{:.3}, {:.3}]",
        pooled.g, pooled.se, pooled.ci_lower, pooled.ci_upper
    )
}

/// One line per excluded record, empty when nothing was excluded
pub fn format_exclusions(group: &OutcomeGroup) -> String {
    group
        .excluded
        .iter()
        .map(|e| format!("Excluded: {} ({})", label(&e.record.author_year), e.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Note for an outcome with a single valid study
pub fn format_single_study(group: &OutcomeGroup) -> String {
    let mut text = format!(
        "Insufficient valid data for meta-analysis of {}: {} valid study, pooling skipped",
        group.outcome_name,
        group.valid.len()
    );
    if let Some(study) = group.valid.first() {
        text.push_str(&format!(
            "\nStudy {}: g = {}, se_g = {}",
            label(&study.author_year),
            fmt_effect(study.g()),
            fmt_effect(study.se_g())
        ));
    }
    text
}

/// Chart title used in the generated-charts listing
pub fn chart_title(outcome_name: &str) -> String {
    format!("Forest Plot - {}", display_name(outcome_name))
}

/// Entry in the GENERATED CHARTS section
pub fn format_chart_entry(outcome_name: &str, filename: &str) -> String {
    format!(
        "Chart: {}\n\
         Filename: {}\n\
         Description: Forest plot showing standardized mean differences for {} with 95% confidence intervals",
        chart_title(outcome_name),
        filename,
        display_name(outcome_name)
    )
}
