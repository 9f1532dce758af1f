//! Tabular outputs for the `trend` and `significance` commands.

use crate::dataset::{ContingencyTable, TrendSeries};
use crate::stats::{
    independence, proportion_trend, uniform_goodness_of_fit, ChiSquareOutcome, StatsError,
    TestOutcome,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Trend test result for one category.
#[derive(Debug, Clone)]
pub struct TrendRow {
    pub series: TrendSeries,
    pub outcome: Result<ChiSquareOutcome, StatsError>,
}

impl TrendRow {
    pub fn evaluate(series: TrendSeries) -> Self {
        let outcome = proportion_trend(&series.counts, &series.totals);
        Self { series, outcome }
    }

    /// Proportion of the group at `index`, in percent.
    pub fn proportion(&self, index: usize) -> f64 {
        let total = self.series.totals[index];
        if total == 0 {
            return 0.0;
        }
        self.series.counts[index] as f64 / total as f64 * 100.0
    }
}

/// Union of every series' periods, in first-seen order.
fn all_periods(rows: &[TrendRow]) -> Vec<String> {
    let mut periods: Vec<String> = Vec::new();
    for row in rows {
        for period in &row.series.periods {
            if !periods.contains(period) {
                periods.push(period.clone());
            }
        }
    }
    periods
}

/// Write trend results as CSV: one row per category with count, total and
/// proportion per period followed by the test statistic, p-value and a
/// significance flag. Failed categories carry `ERROR` in the last columns.
pub fn write_trend_csv<W: Write>(writer: W, rows: &[TrendRow], alpha: f64) -> Result<()> {
    let periods = all_periods(rows);
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["Category".to_string()];
    for period in &periods {
        header.push(format!("{}_Count", period));
        header.push(format!("{}_Total", period));
        header.push(format!("{}_Prop", period));
    }
    header.extend(["Chi_Square", "P_Value", "Significant"].map(String::from));
    csv.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.series.category.clone()];
        for period in &periods {
            match row.series.periods.iter().position(|p| p == period) {
                Some(i) => {
                    record.push(row.series.counts[i].to_string());
                    record.push(row.series.totals[i].to_string());
                    record.push(format!("{:.1}%", row.proportion(i)));
                }
                None => record.extend([String::new(), String::new(), String::new()]),
            }
        }

        match &row.outcome {
            Ok(outcome) => {
                record.push(format!("{:.4}", outcome.statistic));
                record.push(format!("{:.4}", outcome.p_value));
                let significant = if outcome.is_significant(alpha) { "Yes" } else { "No" };
                record.push(significant.to_string());
            }
            Err(_) => record.extend(["ERROR", "ERROR", "ERROR"].map(String::from)),
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Write trend results to a file.
pub fn save_trend_csv(path: &Path, rows: &[TrendRow], alpha: f64) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_trend_csv(file, rows, alpha)
        .with_context(|| format!("Failed to write trend results to {}", path.display()))
}

/// Global tests on a contingency table.
#[derive(Debug, Clone, Serialize)]
pub struct TableSignificance {
    pub row_caption: String,
    pub row_fit: TestOutcome,
    pub column_fit: TestOutcome,
    pub independence: TestOutcome,
}

impl TableSignificance {
    /// Uniform goodness-of-fit on the row and column totals, and the
    /// independence test on the full table.
    pub fn evaluate(table: &ContingencyTable) -> Self {
        Self {
            row_caption: table.row_caption.clone(),
            row_fit: uniform_goodness_of_fit(&table.row_totals()).into(),
            column_fit: uniform_goodness_of_fit(&table.column_totals()).into(),
            independence: independence(&table.counts).into(),
        }
    }

    pub fn to_text(&self) -> String {
        let describe = |outcome: &TestOutcome| match outcome {
            TestOutcome::Computed(result) => format!("{}", result.p_value),
            TestOutcome::Failed { reason } => format!("n/a ({})", reason),
        };
        let caption = if self.row_caption.is_empty() {
            "Row"
        } else {
            self.row_caption.as_str()
        };

        let mut text = String::new();
        text.push_str(&format!("{} breakdown p-value: {}\n", caption, describe(&self.row_fit)));
        text.push_str(&format!("Column breakdown p-value: {}\n", describe(&self.column_fit)));
        text.push_str(&format!(
            "Intersectionality p-value: {}\n",
            describe(&self.independence)
        ));
        text
    }
}
