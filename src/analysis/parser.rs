//! Record parsing.
//!
//! Turns the free-text gender/race fields of a record into one of two
//! shapes: a simple row where every race mention shares the row's gender
//! expansion, or a pairwise row listing `race:gender` pairs.

use crate::models::{Gender, GenderField, LabelIssue, LabelRecord, Race};

/// Gender attribution of a single mention in a pairwise row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// Explicit `race:Male` or `race:Female`.
    Labeled(Gender),
    /// A race listed without a gender; counts for both Male and Female.
    Shared,
}

/// One mention from a pairwise row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairMention {
    pub race: Race,
    pub attribution: Attribution,
}

/// Parsed shape of a record, before per-record deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Simple {
        genders: Vec<Gender>,
        races: Vec<Race>,
    },
    Pairwise(Vec<PairMention>),
}

/// Parse a record. Issues found while parsing are returned alongside;
/// they never prevent the rest of the record from being parsed.
pub fn parse_record(row: usize, record: &LabelRecord) -> (ParsedRecord, Vec<LabelIssue>) {
    let mut issues = Vec::new();

    let gender = record.gender.as_deref().map(GenderField::parse);
    if gender.is_none() {
        issues.push(LabelIssue::EmptyField {
            row,
            field: "gender".to_string(),
        });
    }

    let race_field = match record.race.as_deref() {
        Some(race) => race,
        None => {
            issues.push(LabelIssue::EmptyField {
                row,
                field: "race".to_string(),
            });
            let genders = gender.map(|g| g.expansion()).unwrap_or_default();
            return (
                ParsedRecord::Simple {
                    genders,
                    races: Vec::new(),
                },
                issues,
            );
        }
    };

    match gender {
        Some(GenderField::MaleAndFemale) if race_field.contains(':') => {
            let mentions = parse_pairs(row, race_field, &mut issues);
            (ParsedRecord::Pairwise(mentions), issues)
        }
        other => {
            let genders = match &other {
                Some(GenderField::Unrecognized(value)) => {
                    issues.push(LabelIssue::UnknownGender {
                        row,
                        gender: value.clone(),
                    });
                    Vec::new()
                }
                Some(field) => field.expansion(),
                None => Vec::new(),
            };
            let races = split_simple(race_field)
                .filter_map(Race::normalize)
                .collect();
            (ParsedRecord::Simple { genders, races }, issues)
        }
    }
}

/// Split a simple race field: on `" and "` when present, else one token.
fn split_simple(field: &str) -> impl Iterator<Item = &str> {
    field.split(" and ")
}

/// Split a pairwise race field on `" and "`, `,` and `;`.
fn split_pairwise(field: &str) -> Vec<&str> {
    field
        .split(" and ")
        .flat_map(|part| part.split([',', ';']))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

fn parse_pairs(row: usize, field: &str, issues: &mut Vec<LabelIssue>) -> Vec<PairMention> {
    let mut mentions = Vec::new();

    for token in split_pairwise(field) {
        let Some((race, gender)) = token.split_once(':') else {
            if let Some(race) = Race::normalize(token) {
                mentions.push(PairMention {
                    race,
                    attribution: Attribution::Shared,
                });
            }
            continue;
        };

        let gender = gender.trim();
        let labeled = match gender {
            "Male" => Gender::Male,
            "Female" => Gender::Female,
            _ => {
                issues.push(LabelIssue::MalformedPair {
                    row,
                    token: token.to_string(),
                    reason: format!("invalid gender '{}'", gender),
                });
                continue;
            }
        };

        match Race::normalize(race) {
            Some(race) => mentions.push(PairMention {
                race,
                attribution: Attribution::Labeled(labeled),
            }),
            None => issues.push(LabelIssue::MalformedPair {
                row,
                token: token.to_string(),
                reason: "missing race".to_string(),
            }),
        }
    }

    mentions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race(name: &str) -> Race {
        Race::normalize(name).unwrap()
    }

    fn record(gender: &str, race: &str) -> LabelRecord {
        LabelRecord::new(Some(gender), Some(race))
    }

    fn mention_count(parsed: &ParsedRecord) -> usize {
        match parsed {
            ParsedRecord::Simple { races, .. } => races.len(),
            ParsedRecord::Pairwise(mentions) => mentions.len(),
        }
    }

    #[test]
    fn test_pairwise_row() {
        let (parsed, issues) = parse_record(0, &record("Male and Female", "Asian:Male, Black:Female"));
        assert!(issues.is_empty());
        assert_eq!(
            parsed,
            ParsedRecord::Pairwise(vec![
                PairMention {
                    race: race("Asian"),
                    attribution: Attribution::Labeled(Gender::Male),
                },
                PairMention {
                    race: race("Black"),
                    attribution: Attribution::Labeled(Gender::Female),
                },
            ])
        );
    }

    #[test]
    fn test_pairwise_separators_and_shared_mentions() {
        let (parsed, issues) = parse_record(
            3,
            &record("Male and Female", "East Asian:Female; Hispanic and Caucasian:Male"),
        );
        assert!(issues.is_empty());
        assert_eq!(mention_count(&parsed), 3);

        let (parsed, _) = parse_record(3, &record("Male and Female", "Black:Male, Hispanic"));
        match parsed {
            ParsedRecord::Pairwise(mentions) => {
                assert_eq!(mentions[1].race, race("Hispanic"));
                assert_eq!(mentions[1].attribution, Attribution::Shared);
            }
            other => panic!("expected pairwise row, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_pair_is_isolated() {
        let (parsed, issues) = parse_record(7, &record("Male and Female", "Asian:Purple, Black:Male"));
        assert_eq!(mention_count(&parsed), 1);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            LabelIssue::MalformedPair { row: 7, token, .. } if token == "Asian:Purple"
        ));
    }

    #[test]
    fn test_pair_without_race_is_malformed() {
        let (parsed, issues) = parse_record(0, &record("Male and Female", " :Male"));
        assert_eq!(mention_count(&parsed), 0);
        assert!(matches!(issues[0], LabelIssue::MalformedPair { .. }));
    }

    #[test]
    fn test_simple_row_splits_on_and() {
        let (parsed, issues) = parse_record(0, &record("Female", "Hispanic and Black"));
        assert!(issues.is_empty());
        assert_eq!(
            parsed,
            ParsedRecord::Simple {
                genders: vec![Gender::Female],
                races: vec![race("Hispanic"), race("Black")],
            }
        );
    }

    #[test]
    fn test_male_and_female_without_colon_is_simple() {
        let (parsed, _) = parse_record(0, &record("Male and Female", "Caucasian"));
        assert_eq!(
            parsed,
            ParsedRecord::Simple {
                genders: vec![Gender::Male, Gender::Female],
                races: vec![race("Caucasian")],
            }
        );
    }

    #[test]
    fn test_empty_fields_are_informational() {
        let (parsed, issues) = parse_record(2, &LabelRecord::new(Some("Male"), None));
        assert_eq!(mention_count(&parsed), 0);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_informational());

        let (parsed, issues) = parse_record(2, &LabelRecord::new(None, Some("Asian")));
        assert_eq!(mention_count(&parsed), 1);
        assert!(issues.iter().all(LabelIssue::is_informational));
    }

    #[test]
    fn test_unknown_gender_is_flagged() {
        let (parsed, issues) = parse_record(1, &record("Nonbinary", "Asian"));
        assert_eq!(
            parsed,
            ParsedRecord::Simple {
                genders: Vec::new(),
                races: vec![race("Asian")],
            }
        );
        assert!(matches!(issues[0], LabelIssue::UnknownGender { .. }));
    }
}
