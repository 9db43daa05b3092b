//! EFFECT SIZE: HEDGES' g
//!
//! Standardized mean difference between the post-treatment means of the
//! intervention (n1, m1, sd1) and control (n2, m2, sd2) arms.
//!
//! Algorithm:
//! 1. sd_pooled = sqrt(((n1-1)·sd1² + (n2-1)·sd2²) / (n1+n2-2))
//! 2. sd_pooled == 0 → (g = 0, se_g = 0) under the default policy
//! 3. d = (m1 - m2) / sd_pooled
//! 4. J = 1 - 3 / (4·(n1+n2-2) - 1)
//! 5. g = J·d
//! 6. se_g = sqrt((n1+n2)/(n1·n2) + g²/(2·(n1+n2)))
//!
//! No validation happens here. Arms with fewer than two participants produce
//! NaN or infinite values, which the outcome grouper filters out.

use crate::config::ZeroVariancePolicy;
use crate::data::StudyRecord;
use serde::{Deserialize, Serialize};

/// Hedges' g with its standard error
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    pub g: f64,
    pub se_g: f64,
}

impl EffectSize {
    const UNDEFINED: Self = Self {
        g: f64::NAN,
        se_g: f64::NAN,
    };

    const ZERO: Self = Self { g: 0.0, se_g: 0.0 };
}

/// Degrees-of-freedom weighted pooled standard deviation
pub fn pooled_sd(n1: f64, sd1: f64, n2: f64, sd2: f64) -> f64 {
    (((n1 - 1.0) * sd1.powi(2) + (n2 - 1.0) * sd2.powi(2)) / (n1 + n2 - 2.0)).sqrt()
}

/// Small-sample correction factor J
///
/// `None` when the denominator `4·(n1+n2-2) - 1` is zero.
pub fn hedges_j(n1: f64, n2: f64) -> Option<f64> {
    let denominator = 4.0 * (n1 + n2 - 2.0) - 1.0;
    if denominator == 0.0 {
        return None;
    }
    Some(1.0 - 3.0 / denominator)
}

/// Calculate Hedges' g and se_g for one study
pub fn calculate_hedges_g(
    n1: f64,
    m1: f64,
    sd1: f64,
    n2: f64,
    m2: f64,
    sd2: f64,
    policy: ZeroVariancePolicy,
) -> EffectSize {
    let sd_pooled = pooled_sd(n1, sd1, n2, sd2);

    // No observed variance in either arm
    if sd_pooled == 0.0 {
        return match policy {
            ZeroVariancePolicy::ZeroEffect => EffectSize::ZERO,
            ZeroVariancePolicy::Exclude => EffectSize::UNDEFINED,
        };
    }

    let d = (m1 - m2) / sd_pooled;

    let Some(j) = hedges_j(n1, n2) else {
        return EffectSize::UNDEFINED;
    };
    let g = j * d;

    let se_g = ((n1 + n2) / (n1 * n2) + g.powi(2) / (2.0 * (n1 + n2))).sqrt();

    EffectSize { g, se_g }
}

/// Effect size for a cleaned record
pub fn effect_for_record(record: &StudyRecord, policy: ZeroVariancePolicy) -> EffectSize {
    calculate_hedges_g(
        record.n_intervention,
        record.intervention_post_mean,
        record.intervention_post_sd,
        record.n_control,
        record.control_post_mean,
        record.control_post_sd,
        policy,
    )
}

/// Attach `g` and `se_g` to every record
pub fn attach_effect_sizes(records: &mut [StudyRecord], policy: ZeroVariancePolicy) {
    for record in records.iter_mut() {
        record.effect = Some(effect_for_record(record, policy));
    }
}
