//! Fixed-width window aggregation of wave-height series.
//!
//! Windows are `(x - T, x]` for every boundary `x` that is a multiple of the
//! window length `T` counted from the epoch. A sample at `t` therefore belongs
//! to the window whose boundary is the smallest multiple of `T` at or after `t`,
//! which lets samples be folded in any order without a global sort.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use tracing::debug;

use crate::columns;
use crate::config::BoundaryPolicy;
use crate::error::Result;
use crate::types::{
    naive_from_nanos, naive_to_nanos, BucketStat, WaveHeightSample, COL_TIMESTAMP,
    COL_WAVE_HEIGHT,
};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

#[derive(Debug, Clone)]
struct WindowState {
    first_nanos: i64,
    last_nanos: i64,
    heights: Vec<f64>,
}

/// Incremental fold from raw samples to per-window statistics.
#[derive(Debug, Clone)]
pub struct BucketAccumulator {
    window_nanos: i64,
    policy: BoundaryPolicy,
    windows: BTreeMap<i64, WindowState>,
    first_nanos: Option<i64>,
    last_nanos: Option<i64>,
    samples: usize,
    skipped_nan: usize,
}

impl BucketAccumulator {
    /// `window_seconds` must be positive; `AnalysisConfig::validate` enforces it.
    pub fn new(window_seconds: i64, policy: BoundaryPolicy) -> Self {
        Self {
            window_nanos: window_seconds.max(1) * NANOS_PER_SECOND,
            policy,
            windows: BTreeMap::new(),
            first_nanos: None,
            last_nanos: None,
            samples: 0,
            skipped_nan: 0,
        }
    }

    pub fn push(&mut self, timestamp_nanos: i64, wave_height: f64) {
        if wave_height.is_nan() {
            self.skipped_nan += 1;
            return;
        }

        self.samples += 1;
        self.first_nanos = Some(
            self.first_nanos
                .map_or(timestamp_nanos, |first| first.min(timestamp_nanos)),
        );
        self.last_nanos = Some(
            self.last_nanos
                .map_or(timestamp_nanos, |last| last.max(timestamp_nanos)),
        );

        let boundary = upper_boundary(timestamp_nanos, self.window_nanos);
        self.windows
            .entry(boundary)
            .and_modify(|window| {
                window.first_nanos = window.first_nanos.min(timestamp_nanos);
                window.last_nanos = window.last_nanos.max(timestamp_nanos);
                window.heights.push(wave_height);
            })
            .or_insert_with(|| WindowState {
                first_nanos: timestamp_nanos,
                last_nanos: timestamp_nanos,
                heights: vec![wave_height],
            });
    }

    pub fn push_sample(&mut self, sample: &WaveHeightSample) -> Result<()> {
        self.push(naive_to_nanos(sample.timestamp)?, sample.wave_height);
        Ok(())
    }

    /// Folds a `timestamp`/`wave_height` frame in and returns its row count.
    pub fn push_frame(&mut self, df: &DataFrame) -> Result<usize> {
        let timestamps = columns::datetime_nanos(df, COL_TIMESTAMP)?;
        let heights = columns::f64_values(df, COL_WAVE_HEIGHT)?;
        for (ts, height) in timestamps.into_iter().zip(heights) {
            self.push(ts, height);
        }
        Ok(df.height())
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn skipped_nan_count(&self) -> usize {
        self.skipped_nan
    }

    /// Earliest and latest sample folded in so far, as epoch nanos.
    pub fn span_nanos(&self) -> Option<(i64, i64)> {
        self.first_nanos.zip(self.last_nanos)
    }

    pub fn finish(self) -> Result<Vec<BucketStat>> {
        let Some((first, last)) = self.span_nanos() else {
            return Ok(Vec::new());
        };

        let first_boundary = nearest_boundary(first, self.window_nanos);
        let last_boundary = match self.policy {
            BoundaryPolicy::CoverAll => upper_boundary(last, self.window_nanos),
            BoundaryPolicy::LegacyRounded => nearest_boundary(last, self.window_nanos),
        };
        debug!(
            first_boundary,
            last_boundary,
            windows = self.windows.len(),
            "Closing aggregation windows"
        );

        let mut windows = self.windows;
        let mut stats = Vec::with_capacity(windows.len());
        for (_, window) in windows.range_mut(first_boundary..=last_boundary) {
            let h_max = window
                .heights
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let h_1_3_mean = top_third_mean(&mut window.heights);
            stats.push(BucketStat {
                window_start: naive_from_nanos(window.first_nanos),
                window_end: naive_from_nanos(window.last_nanos),
                h_max,
                h_1_3_mean,
            });
        }

        Ok(stats)
    }
}

/// Aggregates an in-memory series.
pub fn aggregate(
    samples: &[WaveHeightSample],
    window_seconds: i64,
    policy: BoundaryPolicy,
) -> Result<Vec<BucketStat>> {
    let mut acc = BucketAccumulator::new(window_seconds, policy);
    for sample in samples {
        acc.push_sample(sample)?;
    }
    acc.finish()
}

pub fn aggregate_frame(
    df: &DataFrame,
    window_seconds: i64,
    policy: BoundaryPolicy,
) -> Result<Vec<BucketStat>> {
    let mut acc = BucketAccumulator::new(window_seconds, policy);
    acc.push_frame(df)?;
    acc.finish()
}

/// Mean of the highest `floor(n / 3)` values. NaN when that is zero values.
pub fn top_third_mean(heights: &mut [f64]) -> f64 {
    let take = heights.len() / 3;
    if take == 0 {
        return f64::NAN;
    }
    heights.sort_by(f64::total_cmp);
    let top = &heights[heights.len() - take..];
    top.iter().sum::<f64>() / take as f64
}

/// Smallest multiple of `window` that is `>= ts`.
fn upper_boundary(ts: i64, window: i64) -> i64 {
    let quotient = ts.div_euclid(window);
    if ts.rem_euclid(window) == 0 {
        quotient * window
    } else {
        (quotient + 1) * window
    }
}

/// Multiple of `window` nearest to `ts`; halves round up.
fn nearest_boundary(ts: i64, window: i64) -> i64 {
    let quotient = ts.div_euclid(window);
    let remainder = ts.rem_euclid(window);
    if remainder * 2 >= window {
        (quotient + 1) * window
    } else {
        quotient * window
    }
}
