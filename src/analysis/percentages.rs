//! Percentage derivation with residual correction.
//!
//! Percentages carry one decimal and are stored as whole tenths, so a
//! corrected vector sums to exactly 100.0.

use crate::models::{Gender, GENDER_COUNT};
use serde::{Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use super::aggregator::IntersectionTable;

/// Tenths in 100.0%.
pub const FULL_TENTHS: i64 = 1000;

/// A percentage rounded to one decimal place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent {
    tenths: i64,
}

impl Percent {
    pub const ZERO: Percent = Percent { tenths: 0 };

    pub fn from_tenths(tenths: i64) -> Self {
        Self { tenths }
    }

    /// `100 * part / whole`, rounded to one decimal. Zero when `whole` is 0.
    pub fn of(part: u64, whole: u64) -> Self {
        if whole == 0 {
            return Self::ZERO;
        }
        let tenths = (part as f64 * FULL_TENTHS as f64 / whole as f64).round();
        Self {
            tenths: tenths as i64,
        }
    }

    /// Round an arbitrary percentage value to one decimal.
    pub fn from_value(value: f64) -> Self {
        Self {
            tenths: (value * 10.0).round() as i64,
        }
    }

    pub fn tenths(self) -> i64 {
        self.tenths
    }

    pub fn value(self) -> f64 {
        self.tenths as f64 / 10.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.value())
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl Add for Percent {
    type Output = Percent;

    fn add(self, rhs: Percent) -> Percent {
        Percent::from_tenths(self.tenths + rhs.tenths)
    }
}

impl Sum for Percent {
    fn sum<I: Iterator<Item = Percent>>(iter: I) -> Percent {
        iter.fold(Percent::ZERO, Add::add)
    }
}

/// Force `values` to sum to 100.0 by adding the residual to the largest
/// entry. The first maximum wins ties. Empty input is left untouched.
pub fn correct_residual(values: &mut [Percent]) {
    let sum: Percent = values.iter().copied().sum();
    let residual = FULL_TENTHS - sum.tenths;
    if residual == 0 {
        return;
    }

    let mut largest: Option<usize> = None;
    for (i, value) in values.iter().enumerate() {
        match largest {
            Some(j) if values[j] >= *value => {}
            _ => largest = Some(i),
        }
    }

    if let Some(i) = largest {
        values[i] = Percent::from_tenths(values[i].tenths + residual);
    }
}

/// Binomial standard error of a percentage over `n` observations,
/// in percentage points.
pub fn standard_error(percent: Percent, count: u64, n: u64) -> Percent {
    if count == 0 || n == 0 {
        return Percent::ZERO;
    }
    let p = percent.value() / 100.0;
    let variance = (p * (1.0 - p)).max(0.0) / n as f64;
    Percent::from_value(variance.sqrt() * 100.0)
}

/// Percentages derived from an intersection table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PercentageBreakdown {
    /// One entry per race, parallel to the table's race list; each entry
    /// is indexed by [`Gender::index`].
    pub cells: Vec<[Percent; GENDER_COUNT]>,
    /// Gender marginals, indexed by [`Gender::index`].
    pub by_gender: [Percent; GENDER_COUNT],
    /// Race marginals, parallel to the table's race list.
    pub by_race: Vec<Percent>,
    pub se_gender: [Percent; GENDER_COUNT],
    pub se_race: Vec<Percent>,
}

impl PercentageBreakdown {
    /// Derive all percentages from `table` over `total_race_instances`.
    ///
    /// The matrix is corrected first (flattened gender-major), then the
    /// marginals are summed from the corrected matrix and corrected on
    /// their own.
    pub fn derive(table: &IntersectionTable, total_race_instances: u64) -> Self {
        let races = table.races().len();
        if total_race_instances == 0 || races == 0 {
            return Self {
                cells: vec![[Percent::ZERO; GENDER_COUNT]; races],
                by_race: vec![Percent::ZERO; races],
                se_race: vec![Percent::ZERO; races],
                ..Self::default()
            };
        }

        let mut flat: Vec<Percent> = Vec::with_capacity(GENDER_COUNT * races);
        for gender in Gender::ALL {
            for count in table.gender_row(gender) {
                flat.push(Percent::of(count, total_race_instances));
            }
        }
        correct_residual(&mut flat);

        let mut cells = vec![[Percent::ZERO; GENDER_COUNT]; races];
        for gender in Gender::ALL {
            let row = &flat[gender.index() * races..(gender.index() + 1) * races];
            for (r, value) in row.iter().enumerate() {
                cells[r][gender.index()] = *value;
            }
        }

        let mut by_gender = [Percent::ZERO; GENDER_COUNT];
        for gender in Gender::ALL {
            by_gender[gender.index()] = cells.iter().map(|c| c[gender.index()]).sum();
        }
        correct_residual(&mut by_gender);

        let mut by_race: Vec<Percent> = cells.iter().map(|c| c.iter().copied().sum()).collect();
        correct_residual(&mut by_race);

        let gender_counts = table.gender_totals();
        let mut se_gender = [Percent::ZERO; GENDER_COUNT];
        for gender in Gender::ALL {
            let i = gender.index();
            se_gender[i] = standard_error(by_gender[i], gender_counts[i], total_race_instances);
        }

        let race_counts = table.race_totals();
        let se_race = by_race
            .iter()
            .zip(race_counts)
            .map(|(p, count)| standard_error(*p, count, total_race_instances))
            .collect();

        Self {
            cells,
            by_gender,
            by_race,
            se_gender,
            se_race,
        }
    }

    /// Sum of every cell of the matrix.
    pub fn matrix_total(&self) -> Percent {
        self.cells.iter().flat_map(|c| c.iter().copied()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenths(values: &[i64]) -> Vec<Percent> {
        values.iter().copied().map(Percent::from_tenths).collect()
    }

    #[test]
    fn test_percent_of_rounds_to_one_decimal() {
        assert_eq!(Percent::of(1, 3).tenths(), 333);
        assert_eq!(Percent::of(2, 3).tenths(), 667);
        assert_eq!(Percent::of(0, 0), Percent::ZERO);
        assert_eq!(Percent::of(1, 3).to_string(), "33.3");
    }

    #[test]
    fn test_residual_goes_to_largest() {
        // 33.3 + 33.3 + 33.3 = 99.9
        let mut values = tenths(&[333, 333, 333]);
        correct_residual(&mut values);
        assert_eq!(values, tenths(&[334, 333, 333]));

        let mut values = tenths(&[100, 450, 451]);
        correct_residual(&mut values);
        assert_eq!(values, tenths(&[100, 450, 450]));
    }

    #[test]
    fn test_residual_tie_breaks_on_first_maximum() {
        let mut values = tenths(&[200, 401, 401]);
        correct_residual(&mut values);
        assert_eq!(values, tenths(&[200, 399, 401]));
    }

    #[test]
    fn test_exact_sum_untouched() {
        let mut values = tenths(&[250, 750]);
        correct_residual(&mut values);
        assert_eq!(values, tenths(&[250, 750]));

        let mut empty: Vec<Percent> = Vec::new();
        correct_residual(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_standard_error() {
        // sqrt(0.5 * 0.5 / 100) = 0.05 -> 5.0 points
        let se = standard_error(Percent::from_tenths(500), 50, 100);
        assert_eq!(se.tenths(), 50);
        assert_eq!(standard_error(Percent::ZERO, 0, 100), Percent::ZERO);
    }
}
