//! Chi-square test for trend in proportions.
//!
//! Groups are scored 1..k in order. With pooled proportion p = Σx / Σn and
//! weighted mean score s̄ = Σ nᵢsᵢ / Σn:
//!
//! χ² = [Σ xᵢ(sᵢ − s̄)]² / (p(1 − p) Σ nᵢ(sᵢ − s̄)²), df = 1.

use super::{chi2_sf, ChiSquareOutcome, StatsError};

pub fn proportion_trend(successes: &[u64], totals: &[u64]) -> Result<ChiSquareOutcome, StatsError> {
    if successes.len() != totals.len() {
        return Err(StatsError::LengthMismatch {
            observed: successes.len(),
            expected: totals.len(),
        });
    }
    if successes.len() < 2 {
        return Err(StatsError::TooFewCategories {
            required: 2,
            actual: successes.len(),
        });
    }

    for (index, (&x, &n)) in successes.iter().zip(totals).enumerate() {
        if n == 0 {
            return Err(StatsError::ZeroTotal);
        }
        if x > n {
            return Err(StatsError::SuccessesExceedTotal {
                index,
                successes: x,
                total: n,
            });
        }
    }

    let n_total: f64 = totals.iter().map(|&n| n as f64).sum();
    let x_total: f64 = successes.iter().map(|&x| x as f64).sum();
    let pooled = x_total / n_total;
    if pooled <= 0.0 || pooled >= 1.0 {
        return Err(StatsError::DegenerateProportion(pooled));
    }

    let scores: Vec<f64> = (1..=successes.len()).map(|s| s as f64).collect();
    let mean_score = totals
        .iter()
        .zip(&scores)
        .map(|(&n, s)| n as f64 * s)
        .sum::<f64>()
        / n_total;

    let numerator: f64 = successes
        .iter()
        .zip(&scores)
        .map(|(&x, s)| x as f64 * (s - mean_score))
        .sum();
    let spread: f64 = totals
        .iter()
        .zip(&scores)
        .map(|(&n, s)| n as f64 * (s - mean_score).powi(2))
        .sum();

    let statistic = numerator.powi(2) / (pooled * (1.0 - pooled) * spread);
    Ok(ChiSquareOutcome {
        statistic,
        p_value: chi2_sf(statistic, 1)?,
        df: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smokers_example() {
        let outcome = proportion_trend(&[83, 90, 129, 70], &[86, 93, 136, 82]).unwrap();
        assert!((outcome.statistic - 8.224922).abs() < 1e-5);
        assert!((outcome.p_value - 0.004131897).abs() < 1e-7);
        assert_eq!(outcome.df, 1);
    }

    #[test]
    fn test_flat_proportions_have_no_trend() {
        let outcome = proportion_trend(&[50, 100, 25], &[100, 200, 50]).unwrap();
        assert!(outcome.statistic.abs() < 1e-12);
        assert!((outcome.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(
            proportion_trend(&[1, 2], &[3]),
            Err(StatsError::LengthMismatch {
                observed: 2,
                expected: 1
            })
        );
        assert_eq!(proportion_trend(&[1, 2], &[3, 0]), Err(StatsError::ZeroTotal));
        assert!(matches!(
            proportion_trend(&[5, 2], &[3, 4]),
            Err(StatsError::SuccessesExceedTotal { index: 0, .. })
        ));
        assert!(matches!(
            proportion_trend(&[0, 0, 0], &[10, 10, 10]),
            Err(StatsError::DegenerateProportion(_))
        ));
    }
}
