//! Forest Plot Rendering
//!
//! SVG forest plot for one poolable outcome:
//!   - one circle with a horizontal 95% CI bar per study, top to bottom in input order
//!   - a red diamond with its CI bar for the pooled estimate in the bottom row
//!   - a dashed vertical reference line at effect = 0
//!
//! The SVG is assembled as text; no drawing backend is involved.

use crate::grouping::OutcomeGroup;
use crate::metrics::confidence_interval;
use crate::report::text::display_name;
use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const WIDTH: f64 = 800.0;
const ROW_HEIGHT: f64 = 32.0;
const MARGIN_LEFT: f64 = 180.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 56.0;
const MARGIN_BOTTOM: f64 = 120.0;
const CAP_HALF: f64 = 5.0;

const STUDY_COLOR: &str = "#1f77b4";
const POOLED_COLOR: &str = "#d62728";
const REFERENCE_COLOR: &str = "#808080";

/// One plotted row
#[derive(Debug, Clone, PartialEq)]
pub struct ForestRow {
    pub label: String,
    pub estimate: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl ForestRow {
    fn new(label: &str, estimate: f64, se: f64) -> Self {
        let (ci_lower, ci_upper) = confidence_interval(estimate, se);
        Self {
            label: label.to_string(),
            estimate,
            ci_lower,
            ci_upper,
        }
    }

    fn is_finite(&self) -> bool {
        self.estimate.is_finite() && self.ci_lower.is_finite() && self.ci_upper.is_finite()
    }
}

/// Forest plot for a single outcome
#[derive(Debug, Clone)]
pub struct ForestPlot {
    pub outcome_name: String,
    pub studies: Vec<ForestRow>,
    pub pooled: ForestRow,
}

impl ForestPlot {
    /// Build from a pooled outcome group
    ///
    /// Fails if the group has not been pooled or holds non-finite values.
    pub fn from_group(group: &OutcomeGroup) -> Result<Self> {
        let Some(pooled) = group.pooled.as_ref() else {
            bail!("outcome '{}' has no pooled estimate", group.outcome_name);
        };

        let studies: Vec<ForestRow> = group
            .valid
            .iter()
            .filter_map(|r| {
                r.effect
                    .map(|e| ForestRow::new(&r.author_year, e.g, e.se_g))
            })
            .collect();

        let plot = Self {
            outcome_name: group.outcome_name.clone(),
            studies,
            pooled: ForestRow {
                label: "Pooled".to_string(),
                estimate: pooled.g,
                ci_lower: pooled.ci_lower,
                ci_upper: pooled.ci_upper,
            },
        };

        if let Some(row) = plot.rows().find(|r| !r.is_finite()) {
            bail!(
                "non-finite value in row '{}' of outcome '{}'",
                row.label,
                plot.outcome_name
            );
        }

        Ok(plot)
    }

    fn rows(&self) -> impl Iterator<Item = &ForestRow> {
        self.studies.iter().chain(std::iter::once(&self.pooled))
    }

    /// Horizontal data range, always including 0, padded by 5%
    fn x_range(&self) -> (f64, f64) {
        let (lo, hi) = self.rows().fold((0.0f64, 0.0f64), |(lo, hi), r| {
            (lo.min(r.ci_lower), hi.max(r.ci_upper))
        });
        let span = if hi - lo > 0.0 { hi - lo } else { 1.0 };
        (lo - span * 0.05, hi + span * 0.05)
    }

    fn height(&self) -> f64 {
        MARGIN_TOP + (self.studies.len() + 1) as f64 * ROW_HEIGHT + MARGIN_BOTTOM
    }

    /// Render the plot as a standalone SVG document
    pub fn render_svg(&self) -> String {
        let height = self.height();
        let plot_width = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let (lo, hi) = self.x_range();
        let x = |v: f64| MARGIN_LEFT + (v - lo) / (hi - lo) * plot_width;
        let y = |row: usize| MARGIN_TOP + (row as f64 + 0.5) * ROW_HEIGHT;
        let n_rows = self.studies.len() + 1;
        let axis_y = MARGIN_TOP + n_rows as f64 * ROW_HEIGHT;

        let mut svg = String::with_capacity(4096);
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" font-family=\"Helvetica, Arial, sans-serif\">",
            w = WIDTH,
            h = height
        );
        let _ = write!(svg, "<rect width=\"{}\" height=\"{}\" fill=\"#ffffff\"/>", WIDTH, height);

        // Title
        let _ = write!(
            svg,
            "<text x=\"{:.1}\" y=\"30\" font-size=\"16\" text-anchor=\"middle\">Forest Plot for {}</text>",
            WIDTH / 2.0,
            escape_xml(&display_name(&self.outcome_name))
        );

        // Reference line at zero effect
        let _ = write!(
            svg,
            "<line x1=\"{x0:.1}\" y1=\"{top:.1}\" x2=\"{x0:.1}\" y2=\"{bottom:.1}\" stroke=\"{c}\" stroke-dasharray=\"6,4\"/>",
            x0 = x(0.0),
            top = MARGIN_TOP,
            bottom = axis_y,
            c = REFERENCE_COLOR
        );

        for (i, study) in self.studies.iter().enumerate() {
            draw_interval(&mut svg, x(study.ci_lower), x(study.ci_upper), y(i), STUDY_COLOR);
            let _ = write!(
                svg,
                "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"5\" fill=\"{}\"/>",
                x(study.estimate),
                y(i),
                STUDY_COLOR
            );
            draw_row_label(&mut svg, &study.label, y(i));
        }

        // Pooled estimate in the bottom row
        let pooled_y = y(self.studies.len());
        draw_interval(
            &mut svg,
            x(self.pooled.ci_lower),
            x(self.pooled.ci_upper),
            pooled_y,
            POOLED_COLOR,
        );
        let _ = write!(
            svg,
            "<polygon points=\"{}\" fill=\"{}\"/>",
            diamond_points(x(self.pooled.estimate), pooled_y, 7.0),
            POOLED_COLOR
        );
        draw_row_label(&mut svg, &self.pooled.label, pooled_y);

        // X axis with ticks
        let _ = write!(
            svg,
            "<line x1=\"{:.1}\" y1=\"{ay:.1}\" x2=\"{:.1}\" y2=\"{ay:.1}\" stroke=\"#000000\"/>",
            MARGIN_LEFT,
            MARGIN_LEFT + plot_width,
            ay = axis_y
        );
        for tick in axis_ticks(lo, hi) {
            let tx = x(tick);
            let _ = write!(
                svg,
                "<line x1=\"{tx:.1}\" y1=\"{:.1}\" x2=\"{tx:.1}\" y2=\"{:.1}\" stroke=\"#000000\"/><text x=\"{tx:.1}\" y=\"{:.1}\" font-size=\"11\" text-anchor=\"middle\">{}</text>",
                axis_y,
                axis_y + 5.0,
                axis_y + 18.0,
                format_tick(tick),
                tx = tx
            );
        }
        let _ = write!(
            svg,
            "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"middle\">Standardized Mean Difference (Hedges&apos; g)</text>",
            MARGIN_LEFT + plot_width / 2.0,
            axis_y + 40.0
        );

        self.draw_legend(&mut svg, axis_y + 62.0);

        svg.push_str("</svg>");
        svg
    }

    fn draw_legend(&self, svg: &mut String, top: f64) {
        let lx = MARGIN_LEFT;
        let _ = write!(
            svg,
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"5\" fill=\"{}\"/><text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\">Study SMD (95% CI)</text>",
            lx,
            top,
            STUDY_COLOR,
            lx + 14.0,
            top + 4.0
        );
        let _ = write!(
            svg,
            "<polygon points=\"{}\" fill=\"{}\"/><text x=\"{:.1}\" y=\"{:.1}\" font-size=\"11\">{}</text>",
            diamond_points(lx, top + 20.0, 6.0),
            POOLED_COLOR,
            lx + 14.0,
            top + 24.0,
            escape_xml(&self.pooled_legend())
        );
    }

    /// `Pooled SMD (95% CI): g [lower, upper]` to two decimals
    pub fn pooled_legend(&self) -> String {
        format!(
            "Pooled SMD (95% CI): {:.2} [{:.2}, {:.2}]",
            self.pooled.estimate, self.pooled.ci_lower, self.pooled.ci_upper
        )
    }

    /// Write the SVG to `path`, replacing any previous file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create chart directory: {:?}", parent))?;
        }
        fs::write(path, self.render_svg())
            .with_context(|| format!("Failed to write forest plot: {:?}", path))
    }
}

fn draw_interval(svg: &mut String, x1: f64, x2: f64, y: f64, color: &str) {
    let _ = write!(
        svg,
        "<line x1=\"{x1:.1}\" y1=\"{y:.1}\" x2=\"{x2:.1}\" y2=\"{y:.1}\" stroke=\"{c}\" stroke-width=\"1.5\"/>\
         <line x1=\"{x1:.1}\" y1=\"{t:.1}\" x2=\"{x1:.1}\" y2=\"{b:.1}\" stroke=\"{c}\" stroke-width=\"1.5\"/>\
         <line x1=\"{x2:.1}\" y1=\"{t:.1}\" x2=\"{x2:.1}\" y2=\"{b:.1}\" stroke=\"{c}\" stroke-width=\"1.5\"/>",
        x1 = x1,
        x2 = x2,
        y = y,
        t = y - CAP_HALF,
        b = y + CAP_HALF,
        c = color
    );
}

fn draw_row_label(svg: &mut String, label: &str, y: f64) {
    let _ = write!(
        svg,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-size=\"12\" text-anchor=\"end\">{}</text>",
        MARGIN_LEFT - 10.0,
        y + 4.0,
        escape_xml(label)
    );
}

fn diamond_points(cx: f64, cy: f64, r: f64) -> String {
    format!(
        "{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
        cx,
        cy - r,
        cx + r,
        cy,
        cx,
        cy + r,
        cx - r,
        cy
    )
}

/// Tick positions on a 1/2/5 step grid
fn axis_ticks(lo: f64, hi: f64) -> Vec<f64> {
    let span = hi - lo;
    if !(span > 0.0) || !span.is_finite() {
        return vec![];
    }

    let raw_step = span / 6.0;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw_step)
        .unwrap_or(10.0 * magnitude);

    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn format_tick(value: f64) -> String {
    // Avoid "-0.00"
    let value = if value.abs() < 1e-12 { 0.0 } else { value };
    format!("{:.2}", value)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
