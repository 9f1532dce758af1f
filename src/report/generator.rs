//! Markdown and JSON report generation.
//!
//! The Markdown report presents the three figure panels as tables:
//! a) gender breakdown, b) race breakdown, c) gender × race intersection.

use crate::analysis::{LabelSummary, Percent};
use crate::config::ReportConfig;
use crate::models::{AnalysisReport, Gender, ReportMetadata};
use crate::stats::{PairwiseComparison, SignificanceSummary, TestOutcome};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Label Statistics Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_gender_section(&report.summary, options));
    output.push_str(&generate_race_section(&report.summary, options));
    output.push_str(&generate_intersection_section(&report.summary));
    output.push_str(&generate_consistency_section(&report.summary));
    output.push_str(&generate_significance_section(&report.significance, options));
    output.push_str(&generate_warnings_section(&report.summary, options));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Rows:** {}\n", metadata.rows));
    section.push_str(&format!(
        "- **Total Race Instances:** {}\n",
        metadata.total_race_instances
    ));
    if metadata.warnings > 0 {
        section.push_str(&format!("- **Warnings:** {}\n", metadata.warnings));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn format_share(count: u64, percent: Percent, se: Option<Percent>) -> String {
    match se {
        Some(se) if se > Percent::ZERO => format!("| {} | {}% | ±{} |", count, percent, se),
        Some(_) => format!("| {} | {}% | - |", count, percent),
        None => format!("| {} | {}% |", count, percent),
    }
}

fn share_header(label: &str, options: &ReportConfig) -> String {
    if options.include_standard_errors {
        format!("| {} | Count (n) | Percent | SE |\n|:---|:---:|:---:|:---:|\n", label)
    } else {
        format!("| {} | Count (n) | Percent |\n|:---|:---:|:---:|\n", label)
    }
}

/// Panel a): counts per gender.
fn generate_gender_section(summary: &LabelSummary, options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## a) Gender\n\n");
    section.push_str(&share_header("Gender", options));

    let counts = summary.intersection.gender_totals();
    let pct = &summary.percentages;
    for gender in Gender::ALL {
        let i = gender.index();
        let se = options.include_standard_errors.then_some(pct.se_gender[i]);
        section.push_str(&format!(
            "| {} {}\n",
            gender,
            format_share(counts[i], pct.by_gender[i], se)
        ));
    }
    section.push('\n');

    section
}

/// Panel b): race mention counts.
fn generate_race_section(summary: &LabelSummary, options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## b) Race\n\n");
    if summary.race_counts.is_empty() {
        section.push_str("No race mentions were attributed.\n\n");
        return section;
    }

    section.push_str(&share_header("Race", options));

    let pct = &summary.percentages;
    for (i, race) in summary.intersection.races().iter().enumerate() {
        let count = summary.race_counts.get(race).copied().unwrap_or(0);
        let se = options.include_standard_errors.then_some(pct.se_race[i]);
        section.push_str(&format!(
            "| {} {}\n",
            race,
            format_share(count, pct.by_race[i], se)
        ));
    }
    section.push('\n');

    section
}

/// Panel c): intersection counts with their share of all race instances.
fn generate_intersection_section(summary: &LabelSummary) -> String {
    let mut section = String::new();

    section.push_str("## c) Gender × Race\n\n");
    let races = summary.intersection.races();
    if races.is_empty() {
        section.push_str("No race mentions were attributed.\n\n");
        return section;
    }

    section.push_str("| Gender |");
    for race in races {
        section.push_str(&format!(" {} |", race));
    }
    section.push_str("\n|:---|");
    section.push_str(&":---:|".repeat(races.len()));
    section.push('\n');

    let mut genders = Gender::ALL;
    genders.sort_by_key(|g| g.as_str());
    for gender in genders {
        section.push_str(&format!("| {} |", gender));
        for (r, race) in races.iter().enumerate() {
            let count = summary.intersection.get(gender, race);
            if count > 0 {
                let percent = summary.percentages.cells[r][gender.index()];
                section.push_str(&format!(" {} ({}%) |", count, percent));
            } else {
                section.push_str(" - |");
            }
        }
        section.push('\n');
    }
    section.push_str(&format!(
        "\nSum of cell percentages: {}%\n\n",
        summary.percentages.matrix_total()
    ));

    section
}

/// Cross-checks between the panels.
fn generate_consistency_section(summary: &LabelSummary) -> String {
    let mut section = String::new();

    section.push_str("## Consistency\n\n");
    section.push_str(&format!(
        "- Sum of intersection counts: {}\n",
        summary.intersection.total()
    ));
    section.push_str(&format!(
        "- Total race instances: {}\n",
        summary.total_race_instances
    ));

    let mismatched = summary.mismatched_races();
    if mismatched.is_empty() {
        section.push_str("- Every race count matches its intersection column.\n");
    } else {
        section.push_str(
            "- Races whose mentions include shared \"Male and Female\" attributions:\n",
        );
        for (race, mentions, column) in mismatched {
            section.push_str(&format!(
                "  - {}: {} mentions, {} intersection contributions\n",
                race, mentions, column
            ));
        }
    }
    section.push('\n');

    section
}

fn format_outcome(outcome: &TestOutcome) -> String {
    match outcome {
        TestOutcome::Computed(result) => format!(
            "χ² = {:.4}, df = {}, p = {:.4e}",
            result.statistic, result.df, result.p_value
        ),
        TestOutcome::Failed { reason } => format!("not computed ({})", reason),
    }
}

fn generate_pairwise_table(title: &str, comparisons: &[PairwiseComparison]) -> String {
    let mut table = String::new();

    table.push_str(&format!("### {}\n\n", title));
    if comparisons.is_empty() {
        table.push_str("Fewer than two categories.\n\n");
        return table;
    }

    table.push_str("| Comparison | p (adjusted) | Significance |\n");
    table.push_str("|:---|:---:|:---:|\n");
    for comparison in comparisons {
        let p = match (comparison.p_value, comparison.note()) {
            (Some(p), _) => format!("{:.4e}", p),
            (None, Some(note)) => note.to_string(),
            (None, None) => "-".to_string(),
        };
        table.push_str(&format!(
            "| {} vs {} | {} | {} |\n",
            comparison.left, comparison.right, p, comparison.stars
        ));
    }
    table.push('\n');

    table
}

/// Global and pairwise significance tests.
fn generate_significance_section(significance: &SignificanceSummary, options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Significance\n\n");
    section.push_str(&format!(
        "- **Gender (goodness-of-fit, uniform):** {}\n",
        format_outcome(&significance.gender_fit)
    ));
    section.push_str(&format!(
        "- **Race (goodness-of-fit, uniform):** {}\n",
        format_outcome(&significance.race_fit)
    ));
    section.push_str(&format!(
        "- **Gender × Race (independence):** {}\n\n",
        format_outcome(&significance.independence)
    ));

    if options.include_pairwise {
        section.push_str(&generate_pairwise_table(
            "Gender Pairwise",
            &significance.gender_pairs,
        ));
        section.push_str(&generate_pairwise_table(
            "Race Pairwise",
            &significance.race_pairs,
        ));
    }

    section
}

/// Warnings raised while ingesting records.
fn generate_warnings_section(summary: &LabelSummary, options: &ReportConfig) -> String {
    let warnings: Vec<_> = summary
        .issues
        .iter()
        .filter(|i| !i.is_informational())
        .collect();
    if warnings.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Warnings\n\n");
    for issue in warnings.iter().take(options.max_warnings) {
        section.push_str(&format!("- {}\n", issue));
    }
    if warnings.len() > options.max_warnings {
        section.push_str(&format!(
            "- ... and {} more\n",
            warnings.len() - options.max_warnings
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
