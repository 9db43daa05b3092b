//! Metric modules for the meta-analysis
//!
//! - `hedges_g`: Per-study standardized mean difference with small-sample correction
//! - `fixed_effect`: Inverse-variance pooling across the studies of one outcome

pub mod fixed_effect;
pub mod hedges_g;

// Re-export metric functions
pub use fixed_effect::{confidence_interval, pool_fixed_effect, PooledEstimate, Z_95};
pub use hedges_g::{
    attach_effect_sizes, calculate_hedges_g, effect_for_record, hedges_j, pooled_sd, EffectSize,
};
