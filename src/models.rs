//! Data models for label statistics.
//!
//! This module contains the core data structures used throughout
//! the application for representing label records, the gender and
//! race taxonomies, per-row issues, and reports.

use crate::analysis::LabelSummary;
use crate::stats::SignificanceSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of gender buckets in the taxonomy.
pub const GENDER_COUNT: usize = 3;

/// A gender bucket in the label taxonomy.
///
/// Declaration order is the canonical reporting order
/// (Female, Male, Gender-Neutral).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    #[serde(rename = "Gender-Neutral")]
    GenderNeutral,
}

impl Gender {
    /// All buckets in canonical order.
    pub const ALL: [Gender; GENDER_COUNT] = [Gender::Female, Gender::Male, Gender::GenderNeutral];

    /// Position of this bucket in [`Gender::ALL`].
    pub fn index(self) -> usize {
        match self {
            Gender::Female => 0,
            Gender::Male => 1,
            Gender::GenderNeutral => 2,
        }
    }

    /// Exact (case-sensitive) match against a label value.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Female" => Some(Gender::Female),
            "Male" => Some(Gender::Male),
            "Gender-Neutral" => Some(Gender::GenderNeutral),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
            Gender::GenderNeutral => "Gender-Neutral",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of a record's gender column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenderField {
    /// A single bucket.
    Single(Gender),
    /// The composite "Male and Female" label.
    MaleAndFemale,
    /// Any other non-empty value.
    Unrecognized(String),
}

impl GenderField {
    pub const MALE_AND_FEMALE: &'static str = "Male and Female";

    /// Classify an already-trimmed, non-empty gender value.
    pub fn parse(value: &str) -> Self {
        if value == Self::MALE_AND_FEMALE {
            return GenderField::MaleAndFemale;
        }
        match Gender::from_label(value) {
            Some(gender) => GenderField::Single(gender),
            None => GenderField::Unrecognized(value.to_string()),
        }
    }

    /// The buckets a plain mention under this label contributes to.
    pub fn expansion(&self) -> Vec<Gender> {
        match self {
            GenderField::Single(gender) => vec![*gender],
            GenderField::MaleAndFemale => vec![Gender::Male, Gender::Female],
            GenderField::Unrecognized(_) => Vec::new(),
        }
    }
}

/// A normalized race category.
///
/// Known categories are Asian, Black, Caucasian, Hispanic and
/// Middle Eastern; anything else is kept as capitalized free text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Race(String);

impl Race {
    /// Normalize a raw race string.
    ///
    /// Matching is a case-insensitive substring search. Returns `None`
    /// for blank input.
    pub fn normalize(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }

        let canonical = if lowered.contains("caucasian") {
            "Caucasian".to_string()
        } else if lowered.contains("asian") {
            // south asian, east asian, northeast asian
            "Asian".to_string()
        } else if lowered.contains("hispanic") {
            "Hispanic".to_string()
        } else if lowered.contains("middle-eastern") || lowered.contains("middle eastern") {
            "Middle Eastern".to_string()
        } else if lowered.contains("black") {
            "Black".to_string()
        } else {
            capitalize(&lowered)
        };

        Some(Race(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn capitalize(lowered: &str) -> String {
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One input row. Both fields are trimmed; blank values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRecord {
    pub gender: Option<String>,
    pub race: Option<String>,
}

impl LabelRecord {
    /// Build a record from raw column values.
    pub fn new(gender: Option<&str>, race: Option<&str>) -> Self {
        Self {
            gender: clean_field(gender),
            race: clean_field(race),
        }
    }
}

fn clean_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// A non-fatal problem found while ingesting a record.
///
/// None of these abort the aggregation pass; the offending token is
/// excluded from the counts.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelIssue {
    #[error("row {row}: malformed race:gender pair '{token}': {reason}")]
    MalformedPair {
        row: usize,
        token: String,
        reason: String,
    },

    #[error("row {row}: duplicate race '{race}' in '{field}', skipping")]
    DuplicateRace {
        row: usize,
        race: String,
        field: String,
    },

    #[error("row {row}: {field} is empty")]
    EmptyField { row: usize, field: String },

    #[error("row {row}: unrecognized gender '{gender}', race mentions carry no gender")]
    UnknownGender { row: usize, gender: String },
}

impl LabelIssue {
    /// Informational issues are expected in real data and are not warnings.
    pub fn is_informational(&self) -> bool {
        matches!(self, LabelIssue::EmptyField { .. })
    }
}

/// Metadata about an analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analyzed dataset.
    pub input: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Number of rows read from the dataset.
    pub rows: usize,
    /// Total number of attributed race mentions.
    pub total_race_instances: u64,
    /// Number of non-informational issues raised during ingestion.
    pub warnings: usize,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Metadata about the report.
    pub metadata: ReportMetadata,
    /// Aggregated counts and percentages.
    pub summary: LabelSummary,
    /// Significance tests over the aggregated counts.
    pub significance: SignificanceSummary,
}
