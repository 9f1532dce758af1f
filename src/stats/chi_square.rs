//! Goodness-of-fit, independence and pairwise chi-square tests.

use super::{asterisks, chi2_sf, ChiSquareOutcome, StatsError};
use serde::Serialize;

/// Goodness-of-fit test: χ² = Σ (O − E)² / E with k − 1 degrees of freedom.
pub fn goodness_of_fit(observed: &[f64], expected: &[f64]) -> Result<ChiSquareOutcome, StatsError> {
    if observed.len() != expected.len() {
        return Err(StatsError::LengthMismatch {
            observed: observed.len(),
            expected: expected.len(),
        });
    }

    let k = observed.len();
    if k < 2 {
        return Err(StatsError::TooFewCategories {
            required: 2,
            actual: k,
        });
    }

    if expected.iter().any(|&e| e <= 0.0) {
        return Err(StatsError::NonPositiveExpected);
    }

    let statistic = observed
        .iter()
        .zip(expected)
        .map(|(&o, &e)| (o - e).powi(2) / e)
        .sum::<f64>();

    let df = k - 1;
    Ok(ChiSquareOutcome {
        statistic,
        p_value: chi2_sf(statistic, df)?,
        df,
    })
}

/// Goodness-of-fit against a uniform distribution over the categories.
pub fn uniform_goodness_of_fit(counts: &[u64]) -> Result<ChiSquareOutcome, StatsError> {
    let total: u64 = counts.iter().sum();
    if counts.len() >= 2 && total == 0 {
        return Err(StatsError::ZeroTotal);
    }

    let observed: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    let expected = vec![total as f64 / counts.len().max(1) as f64; counts.len()];
    goodness_of_fit(&observed, &expected)
}

/// Chi-square test of independence on a contingency table.
///
/// Rows and columns whose total is zero are dropped first. With one
/// degree of freedom the Yates continuity correction is applied.
pub fn independence(table: &[Vec<u64>]) -> Result<ChiSquareOutcome, StatsError> {
    let columns = table.iter().map(Vec::len).max().unwrap_or(0);
    let cell = |r: usize, c: usize| table[r].get(c).copied().unwrap_or(0);

    let rows: Vec<usize> = (0..table.len())
        .filter(|&r| (0..columns).any(|c| cell(r, c) > 0))
        .collect();
    let cols: Vec<usize> = (0..columns)
        .filter(|&c| rows.iter().any(|&r| cell(r, c) > 0))
        .collect();

    if rows.is_empty() {
        return Err(StatsError::ZeroTotal);
    }
    if rows.len() < 2 || cols.len() < 2 {
        return Err(StatsError::DegenerateTable {
            rows: rows.len(),
            columns: cols.len(),
        });
    }

    let row_totals: Vec<f64> = rows
        .iter()
        .map(|&r| cols.iter().map(|&c| cell(r, c) as f64).sum())
        .collect();
    let col_totals: Vec<f64> = cols
        .iter()
        .map(|&c| rows.iter().map(|&r| cell(r, c) as f64).sum())
        .collect();
    let total: f64 = row_totals.iter().sum();

    let df = (rows.len() - 1) * (cols.len() - 1);
    let yates = df == 1;

    let mut statistic = 0.0;
    for (i, &r) in rows.iter().enumerate() {
        for (j, &c) in cols.iter().enumerate() {
            let expected = row_totals[i] * col_totals[j] / total;
            let mut deviation = (cell(r, c) as f64 - expected).abs();
            if yates {
                deviation -= deviation.min(0.5);
            }
            statistic += deviation * deviation / expected;
        }
    }

    Ok(ChiSquareOutcome {
        statistic,
        p_value: chi2_sf(statistic, df)?,
        df,
    })
}

/// One pairwise comparison between two categories.
#[derive(Debug, Clone, Serialize)]
pub struct PairwiseComparison {
    pub left: String,
    pub right: String,
    /// Adjusted p-value; `None` when one of the counts is zero.
    pub p_value: Option<f64>,
    pub stars: &'static str,
}

impl PairwiseComparison {
    pub fn note(&self) -> Option<&'static str> {
        self.p_value.is_none().then_some("one count is zero")
    }
}

/// Compare every pair of categories with a two-category uniform
/// goodness-of-fit test. With `bonferroni`, p-values are multiplied by the
/// number of pairs (unclamped).
pub fn pairwise(labels: &[String], counts: &[u64], bonferroni: bool) -> Vec<PairwiseComparison> {
    let k = labels.len().min(counts.len());
    let pairs = k * k.saturating_sub(1) / 2;
    let factor = if bonferroni { pairs as f64 } else { 1.0 };

    let mut comparisons = Vec::with_capacity(pairs);
    for i in 0..k {
        for j in (i + 1)..k {
            let p_value = if counts[i] > 0 && counts[j] > 0 {
                uniform_goodness_of_fit(&[counts[i], counts[j]])
                    .ok()
                    .map(|outcome| outcome.p_value * factor)
            } else {
                None
            };

            comparisons.push(PairwiseComparison {
                left: labels[i].clone(),
                right: labels[j].clone(),
                p_value,
                stars: p_value.map(asterisks).unwrap_or("ns"),
            });
        }
    }

    comparisons
}
