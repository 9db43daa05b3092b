//! POOLING: FIXED-EFFECT INVERSE-VARIANCE MODEL
//!
//! Combines the valid studies of one outcome into a single estimate,
//! assuming every study measures the same true effect.
//!
//!   w_i       = 1 / se_i²
//!   pooled_g  = Σ(w_i·g_i) / Σw_i
//!   pooled_se = sqrt(1 / Σw_i)
//!   95% CI    = pooled_g ± 1.96·pooled_se
//!
//! No heterogeneity statistic is computed.

use crate::metrics::EffectSize;
use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.96;

/// Pooled estimate for one outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledEstimate {
    pub g: f64,
    pub se: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// Per-study weights, in input order
    pub weights: Vec<f64>,
    pub total_weight: f64,
}

impl PooledEstimate {
    pub fn n_studies(&self) -> usize {
        self.weights.len()
    }

    /// Share of the total weight carried by each study
    pub fn relative_weights(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w / self.total_weight).collect()
    }
}

/// 95% confidence interval around an estimate
pub fn confidence_interval(estimate: f64, se: f64) -> (f64, f64) {
    (estimate - Z_95 * se, estimate + Z_95 * se)
}

/// Pool studies with inverse-variance weights
///
/// Returns `None` for fewer than two studies or when any standard error is
/// not finite and strictly positive.
pub fn pool_fixed_effect(effects: &[EffectSize]) -> Option<PooledEstimate> {
    if effects.len() < 2 {
        return None;
    }
    if effects
        .iter()
        .any(|e| !e.g.is_finite() || !e.se_g.is_finite() || e.se_g <= 0.0)
    {
        return None;
    }

    let weights: Vec<f64> = effects.iter().map(|e| 1.0 / e.se_g.powi(2)).collect();
    let total_weight: f64 = weights.iter().sum();

    let weighted_sum: f64 = weights
        .iter()
        .zip(effects)
        .map(|(w, e)| w * e.g)
        .sum();

    let g = weighted_sum / total_weight;
    let se = (1.0 / total_weight).sqrt();
    let (ci_lower, ci_upper) = confidence_interval(g, se);

    Some(PooledEstimate {
        g,
        se,
        ci_lower,
        ci_upper,
        weights,
        total_weight,
    })
}
