use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buckets::BucketAccumulator;
use crate::config::{AnalysisConfig, BoundaryPolicy};
use crate::discovery::discover_datasets;
use crate::error::Result;
use crate::error_check::{self, CheckResult};
use crate::outputs::{self, ReportArtifacts};
use crate::sample_store::SampleStore;
use crate::types::{naive_from_nanos, BucketStat};

/// File name of the annotated displacement table written after the error check.
pub const CHECK_OUTPUT_FILE: &str = "raw_plus_std.parquet";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuoyRunSummary {
    pub buoy: String,
    pub bucket: String,
    pub bucket_seconds: i64,
    pub boundary_policy: BoundaryPolicy,
    pub datasets: usize,
    pub rows_read: usize,
    pub samples: usize,
    pub skipped_nan: usize,
    pub windows: usize,
    pub degenerate_windows: usize,
    pub first_sample: Option<NaiveDateTime>,
    pub last_sample: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct BuoyReport {
    pub summary: BuoyRunSummary,
    pub artifacts: ReportArtifacts,
}

/// Reads every monthly dataset of `buoy` one at a time, folding each into
/// a single accumulator.
pub fn aggregate_buoy(
    config: &AnalysisConfig,
    buoy: &str,
) -> Result<(Vec<BucketStat>, BuoyRunSummary)> {
    let datasets = discover_datasets(config, buoy)?;
    if datasets.is_empty() {
        warn!(buoy, "No monthly datasets found");
    }

    let mut acc = BucketAccumulator::new(config.bucket.seconds(), config.boundary_policy);
    let mut rows_read = 0;
    for path in &datasets {
        let df = outputs::read_parquet(path)?;
        let rows = acc.push_frame(&df)?;
        debug!(path = %path.display(), rows, "Folded monthly dataset");
        rows_read += rows;
    }

    let span = acc.span_nanos();
    let samples = acc.sample_count();
    let skipped_nan = acc.skipped_nan_count();
    let stats = acc.finish()?;

    let first_sample = span.map(|(first, _)| naive_from_nanos(first));
    let last_sample = span.map(|(_, last)| naive_from_nanos(last));

    let summary = BuoyRunSummary {
        buoy: buoy.to_string(),
        bucket: config.bucket.label(),
        bucket_seconds: config.bucket.seconds(),
        boundary_policy: config.boundary_policy,
        datasets: datasets.len(),
        rows_read,
        samples,
        skipped_nan,
        windows: stats.len(),
        degenerate_windows: stats.iter().filter(|s| s.is_degenerate()).count(),
        first_sample,
        last_sample,
    };

    Ok((stats, summary))
}

/// Aggregates one buoy and writes its report next to the buoy directories.
pub fn run_buoy(config: &AnalysisConfig, buoy: &str) -> Result<BuoyReport> {
    let (stats, summary) = aggregate_buoy(config, buoy)?;
    let artifacts = outputs::export_report(&stats, &summary, &config.report_stem(buoy))?;

    info!(
        buoy,
        datasets = summary.datasets,
        samples = summary.samples,
        windows = summary.windows,
        degenerate_windows = summary.degenerate_windows,
        "Buoy aggregation complete"
    );

    Ok(BuoyReport { summary, artifacts })
}

/// Runs every configured buoy in order. The first failure aborts the batch;
/// reports already written for earlier buoys stay in place.
pub fn run_all(config: &AnalysisConfig) -> Result<Vec<BuoyReport>> {
    config.validate()?;
    config
        .buoys
        .iter()
        .map(|buoy| run_buoy(config, buoy))
        .collect()
}

/// Runs the displacement error check and, when `output` is given, persists
/// the annotated table there.
pub fn run_error_check(
    store: &SampleStore,
    config: &AnalysisConfig,
    output: Option<&Path>,
) -> Result<CheckResult> {
    config.validate()?;
    let result = error_check::check(store, config.sigma)?;
    if let Some(path) = output {
        outputs::write_parquet(&result.dataframe, path)?;
        info!(
            path = %path.display(),
            rows = result.dataframe.height(),
            "Annotated displacements written"
        );
    }
    Ok(result)
}

/// Default location of the annotated table for an input file.
pub fn default_check_output(input: &Path) -> PathBuf {
    input.with_file_name(CHECK_OUTPUT_FILE)
}
