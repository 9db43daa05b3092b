//! Outcome Grouping
//!
//! Partitions study records by outcome name and keeps the statistically valid
//! subset of each group. Names are matched exactly and case-sensitively; no
//! normalization is applied to labels coming from the extraction stage.
//!
//! Group status by valid record count:
//!   - ≥ 2: poolable
//!   - 1:   single-study outcome, never pooled
//!   - 0:   dropped from the report with a warning

use crate::data::StudyRecord;
use crate::metrics::{pool_fixed_effect, EffectSize, PooledEstimate};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Why a record did not make it into the valid subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Fewer than two participants in an arm
    SampleSizeTooSmall,
    /// se_g == 0 (zero pooled standard deviation)
    ZeroStandardError,
    /// se_g is NaN or infinite, or was never calculated
    NonFiniteStandardError,
}

impl ExclusionReason {
    fn classify(record: &StudyRecord) -> Option<Self> {
        if record.is_statistically_valid() {
            return None;
        }
        if !record.has_valid_sample_sizes() {
            return Some(Self::SampleSizeTooSmall);
        }
        match record.se_g() {
            Some(se) if se.is_finite() => Some(Self::ZeroStandardError),
            _ => Some(Self::NonFiniteStandardError),
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::SampleSizeTooSmall => "sample size below 2 in at least one arm",
            Self::ZeroStandardError => "zero standard error (no observed variance)",
            Self::NonFiniteStandardError => "non-finite standard error",
        };
        f.write_str(text)
    }
}

/// A record left out of the valid subset
#[derive(Debug, Clone)]
pub struct ExcludedRecord {
    pub record: StudyRecord,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Poolable,
    SingleStudy,
    NoValidStudies,
}

/// All records sharing one outcome name
#[derive(Debug, Clone)]
pub struct OutcomeGroup {
    pub outcome_name: String,
    /// Every cleaned record for the outcome, input order
    pub records: Vec<StudyRecord>,
    /// Statistically valid subset, input order
    pub valid: Vec<StudyRecord>,
    pub excluded: Vec<ExcludedRecord>,
    /// Set by `pool` for poolable groups only
    pub pooled: Option<PooledEstimate>,
}

impl OutcomeGroup {
    fn new(outcome_name: String) -> Self {
        Self {
            outcome_name,
            records: Vec::new(),
            valid: Vec::new(),
            excluded: Vec::new(),
            pooled: None,
        }
    }

    fn push(&mut self, record: StudyRecord) {
        match ExclusionReason::classify(&record) {
            None => self.valid.push(record.clone()),
            Some(reason) => self.excluded.push(ExcludedRecord {
                record: record.clone(),
                reason,
            }),
        }
        self.records.push(record);
    }

    pub fn status(&self) -> OutcomeStatus {
        match self.valid.len() {
            0 => OutcomeStatus::NoValidStudies,
            1 => OutcomeStatus::SingleStudy,
            _ => OutcomeStatus::Poolable,
        }
    }

    /// Effect sizes of the valid subset
    pub fn effects(&self) -> Vec<EffectSize> {
        self.valid.iter().filter_map(|r| r.effect).collect()
    }

    /// Compute the fixed-effect estimate if the group is poolable
    pub fn pool(&mut self) -> Option<&PooledEstimate> {
        self.pooled = match self.status() {
            OutcomeStatus::Poolable => pool_fixed_effect(&self.effects()),
            _ => None,
        };
        self.pooled.as_ref()
    }
}

/// Group records by outcome name, in order of first appearance
///
/// Records without an outcome name cannot be grouped and are skipped.
pub fn group_by_outcome(records: &[StudyRecord]) -> Vec<OutcomeGroup> {
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    let mut groups: Vec<OutcomeGroup> = Vec::new();

    for record in records {
        if record.outcome_name.is_empty() {
            warn!(study = %record.author_year, "skipping record without outcome name");
            continue;
        }

        let slot = *index.entry(record.outcome_name.as_str()).or_insert_with(|| {
            groups.push(OutcomeGroup::new(record.outcome_name.clone()));
            groups.len() - 1
        });
        groups[slot].push(record.clone());
    }

    for group in groups.iter().filter(|g| g.status() == OutcomeStatus::NoValidStudies) {
        warn!(
            outcome = %group.outcome_name,
            records = group.records.len(),
            "no statistically valid studies, outcome dropped from report"
        );
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(outcome: &str, author: &str, n: f64, effect: Option<EffectSize>) -> StudyRecord {
        StudyRecord {
            outcome_name: outcome.to_string(),
            author_year: author.to_string(),
            intervention_name: "Curcumin".to_string(),
            dose_mg_per_day: Some("1000".to_string()),
            n_intervention: n,
            n_control: n,
            intervention_post_mean: 1.0,
            intervention_post_sd: 1.0,
            control_post_mean: 1.0,
            control_post_sd: 1.0,
            extras: BTreeMap::new(),
            effect,
        }
    }

    fn valid(g: f64, se_g: f64) -> Option<EffectSize> {
        Some(EffectSize { g, se_g })
    }

    #[test]
    fn test_groups_preserve_first_appearance_order() {
        let records = vec![
            record("LDL", "A 2020", 20.0, valid(0.1, 0.2)),
            record("HDL", "A 2020", 20.0, valid(0.2, 0.2)),
            record("LDL", "B 2021", 20.0, valid(0.3, 0.2)),
        ];

        let groups = group_by_outcome(&records);
        let names: Vec<&str> = groups.iter().map(|g| g.outcome_name.as_str()).collect();
        assert_eq!(names, vec!["LDL", "HDL"]);
        assert_eq!(groups[0].status(), OutcomeStatus::Poolable);
        assert_eq!(groups[1].status(), OutcomeStatus::SingleStudy);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let records = vec![
            record("LDL", "A 2020", 20.0, valid(0.1, 0.2)),
            record("ldl", "B 2021", 20.0, valid(0.3, 0.2)),
            record("LDL ", "C 2022", 20.0, valid(0.3, 0.2)),
        ];

        let groups = group_by_outcome(&records);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.status() == OutcomeStatus::SingleStudy));
    }

    #[test]
    fn test_zero_and_non_finite_standard_errors_are_excluded() {
        let records = vec![
            record("CRP", "A 2020", 20.0, valid(0.0, 0.0)),
            record("CRP", "B 2021", 20.0, valid(f64::NAN, f64::NAN)),
            record("CRP", "C 2022", 20.0, valid(0.4, f64::INFINITY)),
            record("CRP", "D 2023", 20.0, valid(0.4, 0.3)),
        ];

        let groups = group_by_outcome(&records);
        let group = &groups[0];
        assert_eq!(group.records.len(), 4);
        assert_eq!(group.valid.len(), 1);
        assert_eq!(group.status(), OutcomeStatus::SingleStudy);

        let reasons: Vec<ExclusionReason> = group.excluded.iter().map(|e| e.reason).collect();
        assert_eq!(
            reasons,
            vec![
                ExclusionReason::ZeroStandardError,
                ExclusionReason::NonFiniteStandardError,
                ExclusionReason::NonFiniteStandardError,
            ]
        );
    }

    #[test]
    fn test_small_arms_are_excluded_even_with_finite_se() {
        let records = vec![
            record("ALT", "A 2020", 1.0, valid(0.0, 1.2)),
            record("ALT", "B 2021", 30.0, valid(0.2, 0.25)),
        ];

        let groups = group_by_outcome(&records);
        assert_eq!(groups[0].valid.len(), 1);
        assert_eq!(
            groups[0].excluded[0].reason,
            ExclusionReason::SampleSizeTooSmall
        );
    }

    #[test]
    fn test_pool_only_poolable_groups() {
        let records = vec![
            record("LDL", "A 2020", 20.0, valid(0.1, 0.2)),
            record("LDL", "B 2021", 20.0, valid(0.3, 0.2)),
            record("HDL", "A 2020", 20.0, valid(0.2, 0.2)),
            record("TG", "A 2020", 20.0, valid(0.0, 0.0)),
        ];

        let mut groups = group_by_outcome(&records);
        let pooled_g = groups[0].pool().map(|p| p.g);
        assert!((pooled_g.unwrap() - 0.2).abs() < 1e-12);

        assert!(groups[1].pool().is_none());
        assert!(groups[1].pooled.is_none());

        assert_eq!(groups[2].status(), OutcomeStatus::NoValidStudies);
        assert!(groups[2].pool().is_none());
    }

    #[test]
    fn test_record_without_effect_is_excluded() {
        let records = vec![
            record("ALT", "A 2020", 20.0, None),
            record("ALT", "B 2021", 20.0, valid(0.2, 0.25)),
        ];

        let groups = group_by_outcome(&records);
        assert_eq!(groups[0].status(), OutcomeStatus::SingleStudy);
        assert_eq!(
            groups[0].excluded[0].reason,
            ExclusionReason::NonFiniteStandardError
        );
    }

    #[test]
    fn test_records_without_outcome_are_skipped() {
        let records = vec![record("", "A 2020", 20.0, valid(0.1, 0.2))];
        assert!(group_by_outcome(&records).is_empty());
    }
}
