//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.labeltally.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".labeltally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input column names.
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Significance testing settings.
    #[serde(default)]
    pub significance: SignificanceConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Names of the label columns in the input CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_gender_column")]
    pub gender: String,

    #[serde(default = "default_race_column")]
    pub race: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            gender: default_gender_column(),
            race: default_race_column(),
        }
    }
}

fn default_gender_column() -> String {
    "gender".to_string()
}

fn default_race_column() -> String {
    "race".to_string()
}

/// Significance testing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignificanceConfig {
    /// Threshold below which a trend is reported as significant.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Bonferroni-adjust pairwise comparisons.
    #[serde(default = "default_true")]
    pub bonferroni: bool,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            bonferroni: true,
        }
    }
}

fn default_alpha() -> f64 {
    0.05
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include standard errors next to percentages.
    #[serde(default = "default_true")]
    pub include_standard_errors: bool,

    /// Include pairwise significance sections.
    #[serde(default = "default_true")]
    pub include_pairwise: bool,

    /// Maximum number of individual warnings listed in the report.
    #[serde(default = "default_max_warnings")]
    pub max_warnings: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_standard_errors: true,
            include_pairwise: true,
            max_warnings: default_max_warnings(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_warnings() -> usize {
    50
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Some(crate::cli::Command::Analyze {
                gender_column,
                race_column,
                no_bonferroni,
                no_pairwise,
                ..
            }) => {
                if let Some(ref column) = gender_column {
                    self.columns.gender = column.clone();
                }
                if let Some(ref column) = race_column {
                    self.columns.race = column.clone();
                }
                if *no_bonferroni {
                    self.significance.bonferroni = false;
                }
                if *no_pairwise {
                    self.report.include_pairwise = false;
                }
            }
            Some(crate::cli::Command::Trend { alpha, .. }) => {
                if let Some(alpha) = alpha {
                    self.significance.alpha = *alpha;
                }
            }
            Some(crate::cli::Command::Significance { .. }) | None => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Command, OutputFormat};
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.columns.gender, "gender");
        assert_eq!(config.columns.race, "race");
        assert_eq!(config.significance.alpha, 0.05);
        assert!(config.significance.bonferroni);
        assert_eq!(config.report.max_warnings, 50);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[columns]
gender = "sex"

[significance]
alpha = 0.01
bonferroni = false
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.columns.gender, "sex");
        assert_eq!(config.columns.race, "race");
        assert_eq!(config.significance.alpha, 0.01);
        assert!(!config.significance.bonferroni);
        assert!(config.report.include_pairwise);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[report]\nmax_warnings = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.report.max_warnings, 5);

        std::fs::write(&path, "[report\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args {
            command: Some(Command::Analyze {
                input: PathBuf::from("labels.csv"),
                output: PathBuf::from("report.md"),
                format: OutputFormat::Markdown,
                gender_column: Some("sex".to_string()),
                race_column: None,
                no_bonferroni: true,
                no_pairwise: false,
            }),
            config: None,
            verbose: true,
            quiet: false,
            init_config: false,
        };

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert!(config.general.verbose);
        assert_eq!(config.columns.gender, "sex");
        assert_eq!(config.columns.race, "race");
        assert!(!config.significance.bonferroni);
        assert!(config.report.include_pairwise);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[columns]"));
        assert!(toml_str.contains("[significance]"));
        assert!(toml_str.contains("[report]"));
    }
}
