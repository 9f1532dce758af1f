//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// labeltally - demographic label statistics for generated images
///
/// Aggregates gender and race labels, derives percentages that sum to
/// exactly 100%, and runs chi-square significance tests.
///
/// Examples:
///   labeltally analyze data_final.csv
///   labeltally analyze data_final.csv --format json --output figure2.json
///   labeltally significance counts.csv
///   labeltally trend demographics.csv --output chi_square_trends_results.csv
///   labeltally --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .labeltally.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .labeltally.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate gender/race labels and write a statistics report
    Analyze {
        /// Labeled dataset (CSV with gender and race columns)
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Output file path for the report
        #[arg(short, long, default_value = "label_report.md", value_name = "FILE")]
        output: PathBuf,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// Name of the gender column
        #[arg(long, value_name = "NAME")]
        gender_column: Option<String>,

        /// Name of the race column
        #[arg(long, value_name = "NAME")]
        race_column: Option<String>,

        /// Report unadjusted pairwise p-values
        #[arg(long)]
        no_bonferroni: bool,

        /// Skip pairwise comparisons in the report
        #[arg(long)]
        no_pairwise: bool,
    },

    /// Goodness-of-fit and independence tests on a contingency table
    Significance {
        /// Contingency table (CSV; first column holds row labels)
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Write results as JSON to this file instead of printing them
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Chi-square test for trend in proportions, per category
    Trend {
        /// Long-format table with category, period, count, total columns
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Output CSV for the results
        #[arg(
            short,
            long,
            default_value = "chi_square_trends_results.csv",
            value_name = "FILE"
        )]
        output: PathBuf,

        /// Significance threshold
        #[arg(long, value_name = "P")]
        alpha: Option<f64>,
    },
}

/// Output format for the analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Command {
    /// The input dataset of this command.
    pub fn input(&self) -> &Path {
        match self {
            Command::Analyze { input, .. }
            | Command::Significance { input, .. }
            | Command::Trend { input, .. } => input,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Skip the rest for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("A command is required (analyze, significance, trend)".to_string());
        };

        let input = command.input();
        if !input.exists() {
            return Err(format!("Input file does not exist: {}", input.display()));
        }
        if !input.is_file() {
            return Err(format!("Input path is not a file: {}", input.display()));
        }

        if let Command::Trend {
            alpha: Some(alpha), ..
        } = command
        {
            if !(*alpha > 0.0 && *alpha < 1.0) {
                return Err("Alpha must be between 0 and 1 (exclusive)".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings. `config_verbose`
    /// is the `general.verbose` value from the config file; `--quiet` wins
    /// over both.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
