//! Chi-square significance testing.
//!
//! - **goodness-of-fit**: observed category counts against expected counts
//! - **independence**: contingency tables (with Yates correction at df = 1)
//! - **pairwise**: Bonferroni-adjusted two-category comparisons
//! - **trend**: chi-square test for trend in proportions
//!
//! All p-values come from the chi-squared survival function in `statrs`.

pub mod chi_square;
pub mod trend;

pub use chi_square::*;
pub use trend::*;

use crate::analysis::LabelSummary;
use crate::models::Gender;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

/// Why a statistical test could not be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("test requires at least {required} categories, got {actual}")]
    TooFewCategories { required: usize, actual: usize },

    #[error("length mismatch: {expected} expected values for {observed} observations")]
    LengthMismatch { observed: usize, expected: usize },

    #[error("expected frequencies must be positive")]
    NonPositiveExpected,

    #[error("total count is zero")]
    ZeroTotal,

    #[error("contingency table is degenerate after dropping empty rows and columns ({rows}x{columns})")]
    DegenerateTable { rows: usize, columns: usize },

    #[error("group {index}: {successes} successes exceed total {total}")]
    SuccessesExceedTotal {
        index: usize,
        successes: u64,
        total: u64,
    },

    #[error("pooled proportion is {0}; trend is undefined")]
    DegenerateProportion(f64),

    #[error("chi-squared distribution error: {0}")]
    Distribution(String),
}

/// Result of a chi-square test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquareOutcome {
    /// Chi-square statistic
    pub statistic: f64,

    /// p-value
    pub p_value: f64,

    /// Degrees of freedom
    pub df: usize,
}

impl ChiSquareOutcome {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Either a computed test or the reason it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Computed(ChiSquareOutcome),
    Failed { reason: String },
}

impl From<Result<ChiSquareOutcome, StatsError>> for TestOutcome {
    fn from(result: Result<ChiSquareOutcome, StatsError>) -> Self {
        match result {
            Ok(outcome) => TestOutcome::Computed(outcome),
            Err(e) => TestOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

impl TestOutcome {
    pub fn p_value(&self) -> Option<f64> {
        match self {
            TestOutcome::Computed(outcome) => Some(outcome.p_value),
            TestOutcome::Failed { .. } => None,
        }
    }
}

/// Survival function of the chi-squared distribution.
pub(crate) fn chi2_sf(statistic: f64, df: usize) -> Result<f64, StatsError> {
    let dist = ChiSquared::new(df as f64).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(dist.sf(statistic).clamp(0.0, 1.0))
}

/// Asterisk notation for a p-value.
pub fn asterisks(p_value: f64) -> &'static str {
    if p_value <= 0.0001 {
        "****"
    } else if p_value <= 0.001 {
        "***"
    } else if p_value <= 0.01 {
        "**"
    } else if p_value <= 0.05 {
        "*"
    } else {
        "ns"
    }
}

/// Significance tests over an aggregated label summary.
#[derive(Debug, Clone, Serialize)]
pub struct SignificanceSummary {
    /// Uniform goodness-of-fit over the gender totals.
    pub gender_fit: TestOutcome,
    /// Uniform goodness-of-fit over the race mention counts.
    pub race_fit: TestOutcome,
    /// Independence of gender and race in the intersection table.
    pub independence: TestOutcome,
    pub gender_pairs: Vec<PairwiseComparison>,
    pub race_pairs: Vec<PairwiseComparison>,
}

impl SignificanceSummary {
    pub fn assess(summary: &LabelSummary, bonferroni: bool) -> Self {
        let gender_labels: Vec<String> = Gender::ALL.iter().map(|g| g.to_string()).collect();
        let gender_counts = summary.intersection.gender_totals();

        let race_labels: Vec<String> = summary.race_counts.keys().map(|r| r.to_string()).collect();
        let race_counts: Vec<u64> = summary.race_counts.values().copied().collect();

        Self {
            gender_fit: uniform_goodness_of_fit(&gender_counts).into(),
            race_fit: uniform_goodness_of_fit(&race_counts).into(),
            independence: independence(&summary.intersection.to_matrix()).into(),
            gender_pairs: pairwise(&gender_labels, &gender_counts, bonferroni),
            race_pairs: pairwise(&race_labels, &race_counts, bonferroni),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::models::LabelRecord;

    #[test]
    fn test_asterisks() {
        assert_eq!(asterisks(0.00001), "****");
        assert_eq!(asterisks(0.0001), "****");
        assert_eq!(asterisks(0.0005), "***");
        assert_eq!(asterisks(0.005), "**");
        assert_eq!(asterisks(0.05), "*");
        assert_eq!(asterisks(0.2), "ns");
    }

    #[test]
    fn test_chi2_sf() {
        // df = 2 has a closed form: exp(-x / 2)
        let p = chi2_sf(4.0, 2).unwrap();
        assert!((p - (-2.0f64).exp()).abs() < 1e-9);
        assert!((chi2_sf(0.0, 3).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_chi2_sf_keeps_tiny_p_values() {
        let p = chi2_sf(200.0, 2).unwrap();
        assert!(p > 0.0);
        assert!((p / (-100.0f64).exp() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_failed_outcome_keeps_reason() {
        let outcome: TestOutcome = uniform_goodness_of_fit(&[0, 0]).into();
        assert_eq!(outcome.p_value(), None);
        assert!(matches!(outcome, TestOutcome::Failed { ref reason } if reason.contains("zero")));
    }

    #[test]
    fn test_assess_label_summary() {
        let records = vec![
            LabelRecord::new(Some("Female"), Some("Asian")),
            LabelRecord::new(Some("Female"), Some("Asian")),
            LabelRecord::new(Some("Female"), Some("Black")),
            LabelRecord::new(Some("Male"), Some("Black")),
            LabelRecord::new(Some("Male"), Some("Asian")),
        ];
        let summary = aggregate(&records);
        let significance = SignificanceSummary::assess(&summary, true);

        assert!(significance.gender_fit.p_value().is_some());
        assert!(significance.race_fit.p_value().is_some());
        // Gender-Neutral row is empty and dropped, leaving a 2x2 table.
        assert!(matches!(
            significance.independence,
            TestOutcome::Computed(ChiSquareOutcome { df: 1, .. })
        ));
        assert_eq!(significance.gender_pairs.len(), 3);
        assert_eq!(significance.race_pairs.len(), 1);
    }
}
