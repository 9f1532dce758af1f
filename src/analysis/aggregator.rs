//! Label aggregation.
//!
//! [`LabelAggregator`] consumes records one at a time and accumulates
//! per-race mention counts, the gender × race intersection table and the
//! running total of race instances. [`LabelAggregator::finalize`] freezes
//! the state into a [`LabelSummary`] with derived percentages.

use crate::analysis::parser::{parse_record, Attribution, ParsedRecord};
use crate::analysis::percentages::PercentageBreakdown;
use crate::models::{Gender, GenderField, LabelIssue, LabelRecord, Race, GENDER_COUNT};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Gender × race counts. Every race has a full row of gender buckets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntersectionTable {
    races: Vec<Race>,
    counts: Vec<[u64; GENDER_COUNT]>,
}

impl IntersectionTable {
    /// Races in alphabetical order.
    pub fn races(&self) -> &[Race] {
        &self.races
    }

    pub fn get(&self, gender: Gender, race: &Race) -> u64 {
        self.races
            .binary_search(race)
            .map(|i| self.counts[i][gender.index()])
            .unwrap_or(0)
    }

    /// Counts for `gender`, one per race.
    pub fn gender_row(&self, gender: Gender) -> impl Iterator<Item = u64> + '_ {
        self.counts.iter().map(move |c| c[gender.index()])
    }

    /// Per-gender totals, indexed by [`Gender::index`].
    pub fn gender_totals(&self) -> [u64; GENDER_COUNT] {
        let mut totals = [0; GENDER_COUNT];
        for cell in &self.counts {
            for (total, count) in totals.iter_mut().zip(cell) {
                *total += count;
            }
        }
        totals
    }

    /// Per-race totals, parallel to [`IntersectionTable::races`].
    pub fn race_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|c| c.iter().sum()).collect()
    }

    /// Sum of every cell.
    pub fn total(&self) -> u64 {
        self.counts.iter().flat_map(|c| c.iter()).sum()
    }

    /// Rows are genders (canonical order), columns are races.
    pub fn to_matrix(&self) -> Vec<Vec<u64>> {
        Gender::ALL
            .iter()
            .map(|g| self.gender_row(*g).collect())
            .collect()
    }
}

/// Per-record trace kept for "Male and Female" and "Female" rows.
#[derive(Debug, Clone, Serialize)]
pub struct RecordTrace {
    pub row: usize,
    pub gender: String,
    pub race_field: String,
    /// Attributed races with the gender label they were counted under
    /// ("Both" for a shared mention).
    pub races: Vec<(Race, String)>,
    pub female_increment: u64,
    pub male_increment: u64,
}

/// Frozen result of an aggregation pass.
#[derive(Debug, Clone, Serialize)]
pub struct LabelSummary {
    pub rows: usize,
    pub race_counts: BTreeMap<Race, u64>,
    pub intersection: IntersectionTable,
    pub total_race_instances: u64,
    pub percentages: PercentageBreakdown,
    pub issues: Vec<LabelIssue>,
    pub traces: Vec<RecordTrace>,
}

impl LabelSummary {
    /// Number of non-informational issues.
    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| !i.is_informational()).count()
    }

    /// Races whose mention count differs from their intersection column
    /// total. Only rows with shared mentions produce entries here.
    pub fn mismatched_races(&self) -> Vec<(&Race, u64, u64)> {
        self.intersection
            .races()
            .iter()
            .zip(self.intersection.race_totals())
            .filter_map(|(race, column)| {
                let mentions = self.race_counts.get(race).copied().unwrap_or(0);
                (mentions != column).then_some((race, mentions, column))
            })
            .collect()
    }
}

/// Single-pass accumulator over label records.
#[derive(Debug, Default)]
pub struct LabelAggregator {
    rows: usize,
    race_counts: BTreeMap<Race, u64>,
    intersection: BTreeMap<Race, [u64; GENDER_COUNT]>,
    total_race_instances: u64,
    issues: Vec<LabelIssue>,
    traces: Vec<RecordTrace>,
}

impl LabelAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one record. Problems are logged and recorded, never returned.
    pub fn ingest(&mut self, record: &LabelRecord) {
        let row = self.rows;
        self.rows += 1;

        let (parsed, issues) = parse_record(row, record);
        for issue in issues {
            self.record_issue(issue);
        }

        let race_field = record.race.clone().unwrap_or_default();
        let mut seen: HashSet<Race> = HashSet::new();
        let mut contributions: Vec<(Race, [u64; GENDER_COUNT], String)> = Vec::new();

        match parsed {
            // Without a gender bucket the mentions are not attributed at all.
            ParsedRecord::Simple { genders, races } if genders.is_empty() => {
                if !races.is_empty() {
                    debug!(
                        "row {}: {} race(s) skipped, no gender to attribute to",
                        row,
                        races.len()
                    );
                }
            }
            ParsedRecord::Simple { genders, races } => {
                let label = record.gender.clone().unwrap_or_default();
                for race in races {
                    if !seen.insert(race.clone()) {
                        self.record_issue(LabelIssue::DuplicateRace {
                            row,
                            race: race.to_string(),
                            field: race_field.clone(),
                        });
                        continue;
                    }
                    let mut counts = [0; GENDER_COUNT];
                    for gender in &genders {
                        counts[gender.index()] += 1;
                    }
                    contributions.push((race, counts, label.clone()));
                }
            }
            ParsedRecord::Pairwise(mentions) => {
                for mention in mentions {
                    if !seen.insert(mention.race.clone()) {
                        self.record_issue(LabelIssue::DuplicateRace {
                            row,
                            race: mention.race.to_string(),
                            field: race_field.clone(),
                        });
                        continue;
                    }
                    let mut counts = [0; GENDER_COUNT];
                    let label = match mention.attribution {
                        Attribution::Labeled(gender) => {
                            counts[gender.index()] += 1;
                            gender.to_string()
                        }
                        Attribution::Shared => {
                            counts[Gender::Male.index()] += 1;
                            counts[Gender::Female.index()] += 1;
                            "Both".to_string()
                        }
                    };
                    contributions.push((mention.race, counts, label));
                }
            }
        }

        let mut increments = [0u64; GENDER_COUNT];
        for (race, counts, _) in &contributions {
            *self.race_counts.entry(race.clone()).or_insert(0) += 1;
            self.total_race_instances += 1;

            let cell = self
                .intersection
                .entry(race.clone())
                .or_insert([0; GENDER_COUNT]);
            for (i, count) in counts.iter().enumerate() {
                cell[i] += count;
                increments[i] += count;
            }
        }

        debug!(
            "row {}: {} race(s) attributed from '{}'",
            row,
            contributions.len(),
            race_field
        );

        let traced = record
            .gender
            .as_deref()
            .map(GenderField::parse)
            .filter(|g| matches!(g, GenderField::MaleAndFemale | GenderField::Single(Gender::Female)));
        if traced.is_some() {
            self.traces.push(RecordTrace {
                row,
                gender: record.gender.clone().unwrap_or_default(),
                race_field,
                races: contributions
                    .into_iter()
                    .map(|(race, _, label)| (race, label))
                    .collect(),
                female_increment: increments[Gender::Female.index()],
                male_increment: increments[Gender::Male.index()],
            });
        }
    }

    fn record_issue(&mut self, issue: LabelIssue) {
        if issue.is_informational() {
            debug!("{}", issue);
        } else {
            warn!("{}", issue);
        }
        self.issues.push(issue);
    }

    /// Freeze the accumulated state and derive percentages.
    pub fn finalize(self) -> LabelSummary {
        let (races, counts): (Vec<Race>, Vec<[u64; GENDER_COUNT]>) =
            self.intersection.into_iter().unzip();
        let intersection = IntersectionTable { races, counts };
        let percentages = PercentageBreakdown::derive(&intersection, self.total_race_instances);

        LabelSummary {
            rows: self.rows,
            race_counts: self.race_counts,
            intersection,
            total_race_instances: self.total_race_instances,
            percentages,
            issues: self.issues,
            traces: self.traces,
        }
    }
}

/// Aggregate a whole sequence of records.
#[cfg(test)]
pub fn aggregate<'a, I>(records: I) -> LabelSummary
where
    I: IntoIterator<Item = &'a LabelRecord>,
{
    let mut aggregator = LabelAggregator::new();
    for record in records {
        aggregator.ingest(record);
    }
    aggregator.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gender: &str, race: &str) -> LabelRecord {
        LabelRecord::new(Some(gender), Some(race))
    }

    fn race(name: &str) -> Race {
        Race::normalize(name).unwrap()
    }

    #[test]
    fn test_pairwise_record_contributes_per_gender() {
        let summary = aggregate(&[record("Male and Female", "Asian:Male, Black:Female")]);

        assert_eq!(summary.intersection.get(Gender::Male, &race("Asian")), 1);
        assert_eq!(summary.intersection.get(Gender::Female, &race("Asian")), 0);
        assert_eq!(summary.intersection.get(Gender::Female, &race("Black")), 1);
        assert_eq!(summary.intersection.get(Gender::Male, &race("Black")), 0);
        assert_eq!(summary.race_counts[&race("Asian")], 1);
        assert_eq!(summary.race_counts[&race("Black")], 1);
        assert_eq!(summary.total_race_instances, 2);
    }

    #[test]
    fn test_shared_mention_counts_both_genders_once() {
        let summary = aggregate(&[record("Male and Female", "Caucasian")]);

        let caucasian = race("Caucasian");
        assert_eq!(summary.intersection.get(Gender::Male, &caucasian), 1);
        assert_eq!(summary.intersection.get(Gender::Female, &caucasian), 1);
        assert_eq!(summary.race_counts[&caucasian], 1);
        assert_eq!(summary.total_race_instances, 1);
        assert_eq!(summary.mismatched_races().len(), 1);
    }

    #[test]
    fn test_simple_record_with_two_races() {
        let summary = aggregate(&[record("Female", "Hispanic and Black")]);

        assert_eq!(summary.intersection.get(Gender::Female, &race("Hispanic")), 1);
        assert_eq!(summary.intersection.get(Gender::Female, &race("Black")), 1);
        assert_eq!(summary.total_race_instances, 2);
    }

    #[test]
    fn test_malformed_pair_contributes_nothing() {
        let summary = aggregate(&[record("Male and Female", "Asian:Purple")]);

        assert_eq!(summary.total_race_instances, 0);
        assert!(summary.race_counts.is_empty());
        assert_eq!(summary.intersection.total(), 0);
        assert_eq!(summary.warning_count(), 1);
    }

    #[test]
    fn test_duplicate_race_counted_once_per_record() {
        let summary = aggregate(&[
            record("Male", "South Asian and East Asian"),
            record("Male and Female", "Asian:Male, asian:Female"),
        ]);

        assert_eq!(summary.race_counts[&race("Asian")], 2);
        assert_eq!(summary.total_race_instances, 2);
        assert_eq!(summary.intersection.get(Gender::Male, &race("Asian")), 2);
        assert_eq!(summary.intersection.get(Gender::Female, &race("Asian")), 0);
        assert_eq!(summary.warning_count(), 2);
    }

    #[test]
    fn test_table_is_rectangular() {
        let summary = aggregate(&[
            record("Gender-Neutral", "Middle Eastern"),
            record("Female", "Black"),
        ]);

        let matrix = summary.intersection.to_matrix();
        assert_eq!(matrix.len(), 3);
        assert!(matrix.iter().all(|row| row.len() == 2));
        assert_eq!(summary.intersection.races(), &[race("Black"), race("Middle Eastern")]);
    }

    #[test]
    fn test_totals_agree_without_shared_mentions() {
        let records = vec![
            record("Female", "Asian"),
            record("Female", "Hispanic and Black"),
            record("Male", "Caucasian and asian"),
            record("Gender-Neutral", "Middle-Eastern"),
            record("Male and Female", "Black:Male; Hispanic:Female"),
            record("Male and Female", "Asian:Purple, Caucasian:Female"),
            LabelRecord::new(Some("Female"), None),
        ];
        let summary = aggregate(&records);

        assert_eq!(summary.intersection.total(), summary.total_race_instances);
        for (race, column) in summary
            .intersection
            .races()
            .iter()
            .zip(summary.intersection.race_totals())
        {
            assert_eq!(summary.race_counts[race], column);
        }
        assert!(summary.mismatched_races().is_empty());
        assert_eq!(summary.percentages.matrix_total().tenths(), 1000);
    }

    #[test]
    fn test_percentages_sum_to_exactly_one_hundred() {
        // Three equal cells round to 33.3 each before correction.
        let summary = aggregate(&[
            record("Female", "Asian"),
            record("Male", "Black"),
            record("Gender-Neutral", "Hispanic"),
        ]);

        let pct = &summary.percentages;
        assert_eq!(pct.matrix_total().tenths(), 1000);
        assert_eq!(pct.by_gender.iter().map(|p| p.tenths()).sum::<i64>(), 1000);
        assert_eq!(pct.by_race.iter().map(|p| p.tenths()).sum::<i64>(), 1000);
        // The residual lands on the first maximal cell: Female/Asian.
        assert_eq!(pct.cells[0][Gender::Female.index()].tenths(), 334);
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregate(&Vec::<LabelRecord>::new());
        assert_eq!(summary.rows, 0);
        assert_eq!(summary.total_race_instances, 0);
        assert!(summary.percentages.cells.is_empty());
    }

    #[test]
    fn test_fixture_dataset() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/labels.csv");
        let records =
            crate::dataset::read_label_records(&path, &crate::config::ColumnConfig::default())
                .unwrap();
        let summary = aggregate(&records);

        assert_eq!(summary.rows, 10);
        assert_eq!(summary.total_race_instances, 10);
        assert_eq!(summary.race_counts[&race("Asian")], 3);
        assert_eq!(summary.race_counts[&race("Middle Eastern")], 2);
        assert_eq!(summary.intersection.gender_totals(), [6, 4, 1]);
        // The shared Caucasian mention in row 5 counts for both genders.
        assert_eq!(summary.intersection.total(), 11);
        assert_eq!(summary.warning_count(), 2);
        assert_eq!(summary.percentages.matrix_total().tenths(), 1000);
    }

    #[test]
    fn test_genderless_mentions_are_not_attributed() {
        let summary = aggregate(&[
            record("Female", "Asian"),
            LabelRecord::new(None, Some("Black")),
            record("Nonbinary", "Hispanic"),
        ]);

        assert_eq!(summary.total_race_instances, 1);
        assert_eq!(summary.intersection.total(), summary.total_race_instances);
        assert!(!summary.race_counts.contains_key(&race("Black")));
        assert!(!summary.race_counts.contains_key(&race("Hispanic")));
        assert_eq!(summary.intersection.races(), &[race("Asian")]);
        assert!(summary.mismatched_races().is_empty());
        assert_eq!(summary.warning_count(), 1);

        let pct = &summary.percentages;
        assert_eq!(pct.cells[0][Gender::Female.index()].tenths(), 1000);
        assert_eq!(pct.cells[0][Gender::Male.index()].tenths(), 0);
        assert_eq!(pct.by_race[0].tenths(), 1000);
    }

    #[test]
    fn test_only_unknown_gender_rows_leave_everything_empty() {
        let summary = aggregate(&[record("Nonbinary", "Black")]);

        assert_eq!(summary.total_race_instances, 0);
        assert_eq!(summary.intersection.total(), 0);
        assert!(summary.percentages.cells.is_empty());
        assert_eq!(summary.warning_count(), 1);
    }

    #[test]
    fn test_traces_kept_for_female_and_composite_rows() {
        let summary = aggregate(&[
            record("Female", "Asian"),
            record("Male", "Asian"),
            record("Male and Female", "Black:Male, Hispanic"),
        ]);

        assert_eq!(summary.traces.len(), 2);
        let composite = &summary.traces[1];
        assert_eq!(composite.row, 2);
        assert_eq!(composite.male_increment, 2);
        assert_eq!(composite.female_increment, 1);
        assert_eq!(composite.races[1].1, "Both");
    }
}
