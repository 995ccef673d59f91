use std::path::Path;

use polars::prelude::*;

use crate::columns;
use crate::error::Result;
use crate::outputs;
use crate::types::{
    naive_to_nanos, Axis, Sample, COL_SIGNAL_QUALITY, COL_SOURCE_FILE, COL_TIMESTAMP,
};

/// Validated displacement table sorted by timestamp.
///
/// Construction checks that every required column is present, typed as
/// expected and free of nulls, then normalises the dtypes: `timestamp` as a
/// naive nanosecond datetime, the axes as `f64` and `signal_quality` as `i64`.
#[derive(Debug, Clone)]
pub struct SampleStore {
    df: DataFrame,
}

impl SampleStore {
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let timestamps = samples
            .iter()
            .map(|s| naive_to_nanos(s.timestamp))
            .collect::<Result<Vec<i64>>>()?;
        let source_files: Vec<&str> = samples.iter().map(|s| s.source_file.as_str()).collect();
        let quality: Vec<i64> = samples.iter().map(|s| s.signal_quality).collect();

        let mut columns: Vec<Column> = vec![
            columns::datetime_series(COL_TIMESTAMP, timestamps)?.into(),
            Series::new(COL_SOURCE_FILE.into(), source_files).into(),
        ];
        for axis in Axis::ALL {
            let values: Vec<f64> = samples.iter().map(|s| s.displacement(axis)).collect();
            columns.push(Series::new(axis.column().into(), values).into());
        }
        columns.push(Series::new(COL_SIGNAL_QUALITY.into(), quality).into());

        Self::from_frame(DataFrame::new(columns)?)
    }

    pub fn from_frame(df: DataFrame) -> Result<Self> {
        let mut df = df;

        let timestamp = columns::datetime_column(&df, COL_TIMESTAMP)?;
        df.with_column(timestamp)?;

        columns::string_values(&df, COL_SOURCE_FILE)?;

        for axis in Axis::ALL {
            let values = columns::f64_values(&df, axis.column())?;
            df.with_column(Series::new(axis.column().into(), values))?;
        }

        let quality = columns::i64_values(&df, COL_SIGNAL_QUALITY)?;
        df.with_column(Series::new(COL_SIGNAL_QUALITY.into(), quality))?;

        let sorted = df.sort(
            [COL_TIMESTAMP],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;

        Ok(Self { df: sorted })
    }

    pub fn read_parquet(path: &Path) -> Result<Self> {
        Self::from_frame(outputs::read_parquet(path)?)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }
}
