use std::collections::HashMap;

use polars::prelude::*;
use tracing::{debug, info};

use crate::columns;
use crate::dominant_axis::rank_dominant_axis;
use crate::error::Result;
use crate::sample_store::SampleStore;
use crate::types::{
    Axis, GroupStats, COL_EXCEEDS_STD, COL_MAX_STD_FACTOR, COL_SIGNAL_ERROR, COL_SIGNAL_QUALITY,
    COL_SOURCE_FILE,
};

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub dataframe: DataFrame,
    pub group_stats: HashMap<String, GroupStats>,
    pub summary: CheckSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CheckSummary {
    pub samples: usize,
    pub signal_errors: usize,
    pub exceedances: usize,
    pub ranked: usize,
    pub source_files: usize,
    pub source_files_without_baseline: usize,
}

/// Runs signal-error detection, the per-file deviation check and the
/// dominant-axis ranking over a validated displacement table.
pub fn check(store: &SampleStore, sigma: f64) -> Result<CheckResult> {
    let annotated = detect_signal_errors(store.frame())?;
    let group_stats = group_statistics(&annotated)?;
    let with_std = apply_deviation_threshold(&annotated, &group_stats, sigma)?;
    let ranked = rank_dominant_axis(&with_std)?;

    let summary = summarize(&ranked, &group_stats)?;
    info!(
        samples = summary.samples,
        signal_errors = summary.signal_errors,
        exceedances = summary.exceedances,
        source_files = summary.source_files,
        sigma,
        "Displacement error check complete"
    );

    Ok(CheckResult {
        dataframe: ranked,
        group_stats,
        summary,
    })
}

/// Adds `signal_error`, true wherever the instrument reported a non-zero
/// signal quality.
pub fn detect_signal_errors(df: &DataFrame) -> Result<DataFrame> {
    let quality = columns::i64_values(df, COL_SIGNAL_QUALITY)?;
    let flags: Vec<bool> = quality.iter().map(|q| *q > 0).collect();

    let mut output = df.clone();
    output.with_column(Series::new(COL_SIGNAL_ERROR.into(), flags))?;
    Ok(output)
}

/// Sample standard deviation of each axis per source file, using only rows
/// without a signal error. Files with every row in error still get an entry,
/// with no baseline on any axis.
pub fn group_statistics(df: &DataFrame) -> Result<HashMap<String, GroupStats>> {
    let source_files = columns::string_values(df, COL_SOURCE_FILE)?;
    let signal_error = columns::bool_values(df, COL_SIGNAL_ERROR)?;
    let axes = axis_values(df)?;

    let mut accumulators: HashMap<&str, [RunningStd; 3]> = HashMap::new();
    for (idx, file) in source_files.iter().enumerate() {
        let entry = accumulators.entry(file.as_str()).or_default();
        if signal_error[idx] {
            continue;
        }
        for (acc, values) in entry.iter_mut().zip(axes.iter()) {
            acc.push(values[idx]);
        }
    }

    let stats = accumulators
        .into_iter()
        .map(|(file, [heave, north, west])| {
            let stats = GroupStats {
                source_file: file.to_string(),
                heave_std: heave.sample_std(),
                north_std: north.sample_std(),
                west_std: west.sample_std(),
            };
            if stats.heave_std.is_none() {
                debug!(source_file = file, "No std baseline for source file");
            }
            (file.to_string(), stats)
        })
        .collect();

    Ok(stats)
}

/// Joins each file's standard deviations onto every row and flags rows whose
/// absolute displacement on any axis exceeds `sigma` times that deviation.
pub fn apply_deviation_threshold(
    df: &DataFrame,
    group_stats: &HashMap<String, GroupStats>,
    sigma: f64,
) -> Result<DataFrame> {
    let len = df.height();
    let source_files = columns::string_values(df, COL_SOURCE_FILE)?;
    let axes = axis_values(df)?;

    let mut std_columns: [Vec<Option<f64>>; 3] = [
        Vec::with_capacity(len),
        Vec::with_capacity(len),
        Vec::with_capacity(len),
    ];
    let mut exceeds = Vec::with_capacity(len);

    for (idx, file) in source_files.iter().enumerate() {
        let stats = group_stats.get(file);
        let mut flagged = false;
        for (axis_idx, axis) in Axis::ALL.iter().enumerate() {
            let std = stats.and_then(|s| s.std(*axis));
            flagged |= exceeds_threshold(axes[axis_idx][idx], std, sigma);
            std_columns[axis_idx].push(std);
        }
        exceeds.push(flagged);
    }

    let mut output = df.clone();
    for (axis, values) in Axis::ALL.iter().zip(std_columns) {
        output.with_column(Series::new(axis.std_column().into(), values))?;
    }
    output.with_column(Series::new(COL_EXCEEDS_STD.into(), exceeds))?;

    Ok(output)
}

/// Rows with the largest `max_std_factor` first; rows without a factor last.
pub fn most_severe(df: &DataFrame, limit: usize) -> Result<DataFrame> {
    let sorted = df.sort(
        [COL_MAX_STD_FACTOR],
        SortMultipleOptions::default()
            .with_order_descending(true)
            .with_nulls_last(true)
            .with_maintain_order(true),
    )?;
    Ok(sorted.head(Some(limit)))
}

fn summarize(df: &DataFrame, group_stats: &HashMap<String, GroupStats>) -> Result<CheckSummary> {
    let signal_errors = columns::bool_values(df, COL_SIGNAL_ERROR)?;
    let exceeds = columns::bool_values(df, COL_EXCEEDS_STD)?;
    let factors = columns::optional_f64_values(df, COL_MAX_STD_FACTOR)?;

    Ok(CheckSummary {
        samples: df.height(),
        signal_errors: signal_errors.iter().filter(|flag| **flag).count(),
        exceedances: exceeds.iter().filter(|flag| **flag).count(),
        ranked: factors.iter().filter(|factor| factor.is_some()).count(),
        source_files: group_stats.len(),
        source_files_without_baseline: group_stats
            .values()
            .filter(|stats| Axis::ALL.iter().all(|axis| stats.std(*axis).is_none()))
            .count(),
    })
}

fn axis_values(df: &DataFrame) -> Result<[Vec<f64>; 3]> {
    Ok([
        columns::f64_values(df, Axis::Heave.column())?,
        columns::f64_values(df, Axis::North.column())?,
        columns::f64_values(df, Axis::West.column())?,
    ])
}

/// A missing baseline never trips the threshold.
fn exceeds_threshold(value: f64, std: Option<f64>, sigma: f64) -> bool {
    match std {
        Some(std) => value.abs() > std * sigma,
        None => false,
    }
}

/// Welford accumulator for the unbiased (n - 1) standard deviation.
#[derive(Debug, Clone, Copy, Default)]
struct RunningStd {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStd {
    fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn sample_std(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        Some((self.m2 / (self.count - 1) as f64).sqrt())
    }
}
