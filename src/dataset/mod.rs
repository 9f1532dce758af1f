//! CSV dataset readers.
//!
//! Three inputs are supported: label records (one row per labeled image),
//! contingency tables, and long-format trend tables.

use crate::config::ColumnConfig;
use crate::models::LabelRecord;
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Problems reading a dataset. All of these are fatal for the command.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("line {line}: invalid count '{value}' in column '{column}'")]
    InvalidCount {
        line: u64,
        column: String,
        value: String,
    },

    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("table has no data rows")]
    Empty,
}

fn open(path: &Path) -> Result<File, DatasetError> {
    File::open(path).map_err(|source| DatasetError::Open {
        path: path.display().to_string(),
        source,
    })
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
}

fn parse_count(record: &StringRecord, index: usize, column: &str) -> Result<u64, DatasetError> {
    let value = record.get(index).unwrap_or("").trim();
    value.parse::<u64>().map_err(|_| DatasetError::InvalidCount {
        line: line_of(record),
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Read label records from a CSV file with a header row.
pub fn read_label_records(path: &Path, columns: &ColumnConfig) -> Result<Vec<LabelRecord>, DatasetError> {
    parse_label_records(open(path)?, columns)
}

/// Read label records from any CSV source with a header row.
pub fn parse_label_records<R: Read>(
    source: R,
    columns: &ColumnConfig,
) -> Result<Vec<LabelRecord>, DatasetError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);

    let headers = reader.headers()?.clone();
    let gender_idx = column_index(&headers, &columns.gender)?;
    let race_idx = column_index(&headers, &columns.race)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(LabelRecord::new(row.get(gender_idx), row.get(race_idx)));
    }

    debug!("Read {} label records", records.len());
    Ok(records)
}

/// A contingency table with labeled rows and columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingencyTable {
    /// Caption of the row-label column (first header cell).
    pub row_caption: String,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub counts: Vec<Vec<u64>>,
}

impl ContingencyTable {
    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn column_totals(&self) -> Vec<u64> {
        (0..self.column_labels.len())
            .map(|c| self.counts.iter().map(|row| row[c]).sum())
            .collect()
    }
}

/// Read a contingency table. The header row holds the column labels after
/// a leading caption cell; every other row is a label followed by counts.
pub fn read_contingency_table(path: &Path) -> Result<ContingencyTable, DatasetError> {
    parse_contingency_table(open(path)?)
}

pub fn parse_contingency_table<R: Read>(source: R) -> Result<ContingencyTable, DatasetError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(source);

    let headers = reader.headers()?.clone();
    let row_caption = headers.get(0).unwrap_or("").trim().to_string();
    let column_labels: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut row_labels = Vec::new();
    let mut counts = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.len() != column_labels.len() + 1 {
            return Err(DatasetError::FieldCount {
                line: line_of(&row),
                expected: column_labels.len() + 1,
                found: row.len(),
            });
        }

        row_labels.push(row.get(0).unwrap_or("").trim().to_string());
        let values = column_labels
            .iter()
            .enumerate()
            .map(|(i, column)| parse_count(&row, i + 1, column))
            .collect::<Result<Vec<u64>, _>>()?;
        counts.push(values);
    }

    if counts.is_empty() {
        return Err(DatasetError::Empty);
    }

    Ok(ContingencyTable {
        row_caption,
        row_labels,
        column_labels,
        counts,
    })
}

/// Yearly (or otherwise ordered) success counts for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendSeries {
    pub category: String,
    pub periods: Vec<String>,
    pub counts: Vec<u64>,
    pub totals: Vec<u64>,
}

/// Read a long-format trend table with columns
/// `category,period,count,total`.
pub fn read_trend_table(path: &Path) -> Result<Vec<TrendSeries>, DatasetError> {
    parse_trend_table(open(path)?)
}

pub fn parse_trend_table<R: Read>(source: R) -> Result<Vec<TrendSeries>, DatasetError> {
    let mut reader = ReaderBuilder::new().from_reader(source);

    let headers = reader.headers()?.clone();
    let category_idx = column_index(&headers, "category")?;
    let period_idx = column_index(&headers, "period")?;
    let count_idx = column_index(&headers, "count")?;
    let total_idx = column_index(&headers, "total")?;

    let mut series: Vec<TrendSeries> = Vec::new();
    for row in reader.records() {
        let row = row?;
        let category = row.get(category_idx).unwrap_or("").trim().to_string();
        let period = row.get(period_idx).unwrap_or("").trim().to_string();
        let count = parse_count(&row, count_idx, "count")?;
        let total = parse_count(&row, total_idx, "total")?;

        let entry = match series.iter().position(|s| s.category == category) {
            Some(i) => &mut series[i],
            None => {
                series.push(TrendSeries {
                    category,
                    periods: Vec::new(),
                    counts: Vec::new(),
                    totals: Vec::new(),
                });
                let last = series.len() - 1;
                &mut series[last]
            }
        };
        entry.periods.push(period);
        entry.counts.push(count);
        entry.totals.push(total);
    }

    if series.is_empty() {
        return Err(DatasetError::Empty);
    }

    debug!("Read {} trend categories", series.len());
    Ok(series)
}
