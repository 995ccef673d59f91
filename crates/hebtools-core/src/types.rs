// crates/hebtools-core/src/types.rs

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_SOURCE_FILE: &str = "source_file";
pub const COL_SIGNAL_QUALITY: &str = "signal_quality";
pub const COL_SIGNAL_ERROR: &str = "signal_error";
pub const COL_EXCEEDS_STD: &str = "exceeds_4std";
pub const COL_MAX_STD_FACTOR: &str = "max_std_factor";
pub const COL_DOMINANT_AXIS: &str = "dominant_axis";
pub const COL_WAVE_HEIGHT: &str = "wave_height";

pub const COL_WINDOW_START: &str = "window_start";
pub const COL_H_MAX: &str = "h_max";
pub const COL_H_1_3_MEAN: &str = "h_1_3_mean";
pub const COL_END_TIMES: &str = "end_times";

/// Suffix of the per-axis standard deviation columns joined onto each sample.
pub const FILE_STD_SUFFIX: &str = "_file_std";

/// Buoy displacement axis. Declaration order doubles as the tie-break priority
/// used when two axes share the largest deviation ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Heave,
    North,
    West,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Heave, Axis::North, Axis::West];

    pub fn column(&self) -> &'static str {
        match self {
            Axis::Heave => "heave",
            Axis::North => "north",
            Axis::West => "west",
        }
    }

    pub fn std_column(&self) -> &'static str {
        match self {
            Axis::Heave => "heave_file_std",
            Axis::North => "north_file_std",
            Axis::West => "west_file_std",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One displacement reading from a directional wave rider.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub source_file: String,
    pub heave: f64,
    pub north: f64,
    pub west: f64,
    pub signal_quality: i64,
}

impl Sample {
    pub fn displacement(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Heave => self.heave,
            Axis::North => self.north,
            Axis::West => self.west,
        }
    }
}

/// Per source file dispersion of each axis, computed from non-error samples.
/// `None` means the group had fewer than two usable samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    pub source_file: String,
    pub heave_std: Option<f64>,
    pub north_std: Option<f64>,
    pub west_std: Option<f64>,
}

impl GroupStats {
    pub fn std(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::Heave => self.heave_std,
            Axis::North => self.north_std,
            Axis::West => self.west_std,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveHeightSample {
    pub timestamp: NaiveDateTime,
    pub wave_height: f64,
}

/// Summary of one non-empty aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketStat {
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub h_max: f64,
    pub h_1_3_mean: f64,
}

impl BucketStat {
    /// True when the window held too few samples to populate its top third.
    pub fn is_degenerate(&self) -> bool {
        self.h_1_3_mean.is_nan()
    }
}

/// Epoch nanoseconds of a naive UTC timestamp. Fails outside the years
/// 1677 to 2262, the range of a nanosecond `i64`.
pub fn naive_to_nanos(value: NaiveDateTime) -> Result<i64> {
    value.and_utc().timestamp_nanos_opt().ok_or_else(|| {
        PipelineError::contract(
            COL_TIMESTAMP,
            format!("{value} is outside the nanosecond range"),
        )
    })
}

pub fn naive_from_nanos(value: i64) -> NaiveDateTime {
    DateTime::from_timestamp_nanos(value).naive_utc()
}
