//! labeltally - demographic label statistics for generated images
//!
//! A CLI tool that aggregates gender/race labels attached to generated
//! images, derives percentages that sum to exactly 100%, and runs
//! chi-square significance tests.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable input, bad config, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod dataset;
mod models;
mod report;
mod stats;

use analysis::LabelAggregator;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{AnalysisReport, Gender, ReportMetadata};
use report::{TableSignificance, TrendRow};
use stats::SignificanceSummary;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Read the config before logging so `general.verbose` can raise the level
    let config = load_config(&args);
    let config_verbose = config.as_ref().map(|c| c.general.verbose).unwrap_or(false);

    // Initialize logging
    init_logging(args.log_level(config_verbose));

    info!("labeltally v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match config.and_then(|config| run(args, config)) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .labeltally.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Edit it to customize column names, significance and report options.");
    Ok(())
}

/// Initialize logging at `level`.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the selected command. Returns the exit code.
fn run(args: Args, mut config: Config) -> Result<i32> {
    config.merge_with_args(&args);

    match args.command.clone() {
        Some(Command::Analyze {
            input,
            output,
            format,
            ..
        }) => run_analyze(&config, &input, &output, format, args.quiet),
        Some(Command::Significance { input, output }) => {
            run_significance(&input, output.as_deref())
        }
        Some(Command::Trend { input, output, .. }) => run_trend(&config, &input, &output),
        None => Ok(0),
    }
}

/// Aggregate a label dataset and write the report.
fn run_analyze(
    config: &Config,
    input: &Path,
    output: &Path,
    format: OutputFormat,
    quiet: bool,
) -> Result<i32> {
    let start_time = Instant::now();

    println!("📥 Reading labels: {}", input.display());
    let records = dataset::read_label_records(input, &config.columns)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    info!("Loaded {} records", records.len());

    let progress = if quiet {
        None
    } else {
        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let mut aggregator = LabelAggregator::new();
    for record in &records {
        aggregator.ingest(record);
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let summary = aggregator.finalize();
    if summary.total_race_instances == 0 {
        warn!("No race mentions were attributed; percentages are all zero");
    }

    for trace in &summary.traces {
        debug!(
            "Row {}: {} ({}) -> {:?}, Female increment = {}, Male increment = {}",
            trace.row,
            trace.race_field,
            trace.gender,
            trace.races,
            trace.female_increment,
            trace.male_increment
        );
    }

    let significance = SignificanceSummary::assess(&summary, config.significance.bonferroni);

    let report = AnalysisReport {
        metadata: ReportMetadata {
            input: input.display().to_string(),
            analysis_date: Utc::now(),
            rows: summary.rows,
            total_race_instances: summary.total_race_instances,
            warnings: summary.warning_count(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        summary,
        significance,
    };

    let rendered = match format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    std::fs::write(output, &rendered)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    // Print summary
    let summary = &report.summary;
    let gender_counts = summary.intersection.gender_totals();
    println!("\n📊 Label Summary:");
    println!("   Rows: {}", summary.rows);
    println!("   Total race instances: {}", summary.total_race_instances);
    for gender in Gender::ALL {
        println!(
            "   - {}: {} ({}%)",
            gender,
            gender_counts[gender.index()],
            summary.percentages.by_gender[gender.index()]
        );
    }
    println!("   Races: {}", summary.race_counts.len());
    if report.metadata.warnings > 0 {
        println!("   ⚠️  Warnings: {}", report.metadata.warnings);
    }
    println!("\n✅ Analysis complete! Report saved to: {}", output.display());

    Ok(0)
}

/// Run the global chi-square tests on a contingency table.
fn run_significance(input: &Path, output: Option<&Path>) -> Result<i32> {
    let table = dataset::read_contingency_table(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    info!(
        "Loaded {}x{} contingency table",
        table.row_labels.len(),
        table.column_labels.len()
    );

    let result = TableSignificance::evaluate(&table);

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&result)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            println!("✅ Results saved to: {}", path.display());
        }
        None => print!("{}", result.to_text()),
    }

    Ok(0)
}

/// Run the trend test for every category and write the results CSV.
fn run_trend(config: &Config, input: &Path, output: &Path) -> Result<i32> {
    let series = dataset::read_trend_table(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    println!("Chi-square test for trend in proportions");
    println!("{}", "=".repeat(72));

    let alpha = config.significance.alpha;
    let rows: Vec<TrendRow> = series.into_iter().map(TrendRow::evaluate).collect();
    for row in &rows {
        println!("\n{}:", row.series.category);
        for (i, period) in row.series.periods.iter().enumerate() {
            println!(
                "  {}: {}/{} = {:.1}%",
                period,
                row.series.counts[i],
                row.series.totals[i],
                row.proportion(i)
            );
        }
        match &row.outcome {
            Ok(outcome) => {
                let significant = if outcome.is_significant(alpha) { "Yes" } else { "No" };
                println!(
                    "  Chi-square = {:.4}, p-value = {:.4} [{}]",
                    outcome.statistic, outcome.p_value, significant
                );
            }
            Err(e) => {
                warn!("{}: {}", row.series.category, e);
                println!("  ERROR - {}", e);
            }
        }
    }

    println!("\n{}", "=".repeat(72));
    println!("Note: p < {} indicates a statistically significant trend", alpha);

    report::save_trend_csv(output, &rows, alpha)?;
    println!("\n✅ Results saved to: {}", output.display());

    Ok(0)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so problems with the default file
/// go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", config::CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
