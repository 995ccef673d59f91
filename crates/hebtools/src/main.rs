use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use hebtools_core::{
    config::DEFAULT_SIGMA,
    dominant_axis::dominant_axis_counts,
    error_check::most_severe,
    pipelines::{self, BuoyReport},
    AnalysisConfig, BoundaryPolicy, SampleStore,
};
use polars::prelude::{AnyValue, DataFrame};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "hebtools.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Wave buoy error checks and bucketed wave statistics", long_about = None)]
struct Cli {
    /// Path to the TOML configuration (defaults to ./hebtools.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flag signal errors and std outliers in a displacement parquet file
    Check(CheckArgs),
    /// Aggregate monthly wave-height datasets into per-buoy window reports
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Displacement parquet with timestamp, source_file, heave, north, west, signal_quality
    #[arg(long)]
    input: PathBuf,
    /// Where to write the annotated table (defaults to raw_plus_std.parquet beside the input)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Multiple of the per-file standard deviation that counts as an outlier
    #[arg(long)]
    sigma: Option<f64>,
    /// Number of most severe rows to print
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Args, Debug, Default)]
struct StatsArgs {
    /// Buoys to process instead of the configured list
    #[arg(long = "buoy")]
    buoys: Vec<String>,
    /// Root directory holding one folder per buoy
    #[arg(long)]
    root: Option<PathBuf>,
    /// End at the last sample's rounded boundary, which may drop the final window
    #[arg(long)]
    legacy_boundaries: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Check(args) => handle_check(config, args),
        Command::Stats(args) => handle_stats(config, args),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let config = match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.is_file() {
                AnalysisConfig::load(default_path)
                    .with_context(|| format!("failed to load config {}", DEFAULT_CONFIG_FILE))?
            } else {
                AnalysisConfig::default()
            }
        }
    };
    Ok(config.with_env_overrides())
}

/// Command-line flags win over the config file and `HEBTOOLS_ROOT`.
fn apply_check_overrides(mut config: AnalysisConfig, args: &CheckArgs) -> AnalysisConfig {
    if let Some(sigma) = args.sigma {
        config.sigma = sigma;
    }
    config
}

fn apply_stats_overrides(mut config: AnalysisConfig, args: StatsArgs) -> AnalysisConfig {
    if !args.buoys.is_empty() {
        config.buoys = args.buoys;
    }
    if let Some(root) = args.root {
        config.root_path = root;
    }
    if args.legacy_boundaries {
        config.boundary_policy = BoundaryPolicy::LegacyRounded;
    }
    config
}

fn handle_check(config: AnalysisConfig, args: CheckArgs) -> Result<()> {
    let config = apply_check_overrides(config, &args);
    if config.sigma != DEFAULT_SIGMA {
        info!(sigma = config.sigma, "Using non-default sigma");
    }

    let store = SampleStore::read_parquet(&args.input)
        .with_context(|| format!("failed to load displacements from {}", args.input.display()))?;
    let output = args
        .output
        .unwrap_or_else(|| pipelines::default_check_output(&args.input));

    let result = pipelines::run_error_check(&store, &config, Some(&output))
        .context("displacement error check failed")?;

    let summary = &result.summary;
    println!("Samples checked:          {}", summary.samples);
    println!("Signal errors:            {}", summary.signal_errors);
    println!("Exceeding {} x std:        {}", config.sigma, summary.exceedances);
    println!(
        "Source files:             {} ({} without baseline)",
        summary.source_files, summary.source_files_without_baseline
    );
    for (axis, count) in dominant_axis_counts(&result.dataframe)? {
        println!("Dominant {:<7}          {}", format!("{axis}:"), count);
    }

    let severe = most_severe(&result.dataframe, args.top)?;
    if severe.height() > 0 {
        println!("\n{}", severity_table(&severe)?);
    }
    println!("\nAnnotated table written to {}", output.display());

    Ok(())
}

fn handle_stats(config: AnalysisConfig, args: StatsArgs) -> Result<()> {
    let config = apply_stats_overrides(config, args);
    if config.buoys.is_empty() {
        warn!("No buoys configured; nothing to do");
        return Ok(());
    }

    let reports = pipelines::run_all(&config).context("buoy aggregation failed")?;
    println!("{}", report_table(&reports));
    Ok(())
}

fn report_table(reports: &[BuoyReport]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Buoy",
        "Datasets",
        "Samples",
        "Windows",
        "Degenerate",
        "First sample",
        "Last sample",
        "Report",
    ]);
    for report in reports {
        let summary = &report.summary;
        table.add_row(vec![
            summary.buoy.clone(),
            summary.datasets.to_string(),
            summary.samples.to_string(),
            summary.windows.to_string(),
            summary.degenerate_windows.to_string(),
            summary
                .first_sample
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "-".to_string()),
            summary
                .last_sample
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| "-".to_string()),
            report.artifacts.csv_path.display().to_string(),
        ]);
    }
    table
}

fn severity_table(df: &DataFrame) -> Result<Table> {
    const COLUMNS: [&str; 6] = [
        "timestamp",
        "source_file",
        "dominant_axis",
        "max_std_factor",
        "exceeds_4std",
        "signal_error",
    ];

    let mut table = Table::new();
    table.set_header(COLUMNS.to_vec());
    for idx in 0..df.height() {
        let mut row = Vec::with_capacity(COLUMNS.len());
        for name in COLUMNS {
            let value = df.column(name)?.get(idx)?;
            row.push(match value {
                AnyValue::Null => "-".to_string(),
                AnyValue::String(text) => text.to_string(),
                AnyValue::Float64(v) => format!("{v:.3}"),
                other => other.to_string(),
            });
        }
        table.add_row(row);
    }
    Ok(table)
}
