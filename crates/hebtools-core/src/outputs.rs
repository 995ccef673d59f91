use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::columns;
use crate::error::{PipelineError, Result};
use crate::types::{
    naive_from_nanos, naive_to_nanos, BucketStat, COL_END_TIMES, COL_H_1_3_MEAN, COL_H_MAX,
    COL_WINDOW_START,
};

/// Locations of the files written for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportArtifacts {
    pub parquet_path: PathBuf,
    pub csv_path: PathBuf,
    pub summary_path: PathBuf,
}

/// One spreadsheet row, indexed by window start.
#[derive(Debug, Serialize, Deserialize)]
struct ReportRow {
    window_start: NaiveDateTime,
    h_max: f64,
    h_1_3_mean: f64,
    end_times: NaiveDateTime,
}

/// Converts bucket statistics to the report frame: `window_start`, `h_max`,
/// `h_1_3_mean`, `end_times`.
pub fn bucket_stats_to_frame(stats: &[BucketStat]) -> Result<DataFrame> {
    let starts = stats
        .iter()
        .map(|s| naive_to_nanos(s.window_start))
        .collect::<Result<Vec<i64>>>()?;
    let ends = stats
        .iter()
        .map(|s| naive_to_nanos(s.window_end))
        .collect::<Result<Vec<i64>>>()?;
    let h_max: Vec<f64> = stats.iter().map(|s| s.h_max).collect();
    let h_1_3_mean: Vec<f64> = stats.iter().map(|s| s.h_1_3_mean).collect();

    Ok(DataFrame::new(vec![
        columns::datetime_series(COL_WINDOW_START, starts)?.into(),
        Series::new(COL_H_MAX.into(), h_max).into(),
        Series::new(COL_H_1_3_MEAN.into(), h_1_3_mean).into(),
        columns::datetime_series(COL_END_TIMES, ends)?.into(),
    ])?)
}

pub fn bucket_stats_from_frame(df: &DataFrame) -> Result<Vec<BucketStat>> {
    let starts = columns::datetime_nanos(df, COL_WINDOW_START)?;
    let ends = columns::datetime_nanos(df, COL_END_TIMES)?;
    let h_max = columns::f64_values(df, COL_H_MAX)?;
    let h_1_3_mean = columns::f64_values(df, COL_H_1_3_MEAN)?;

    Ok((0..df.height())
        .map(|idx| BucketStat {
            window_start: naive_from_nanos(starts[idx]),
            window_end: naive_from_nanos(ends[idx]),
            h_max: h_max[idx],
            h_1_3_mean: h_1_3_mean[idx],
        })
        .collect())
}

/// Writes the parquet, CSV and JSON summary for one report. Each file is
/// written to a temporary sibling and renamed into place.
pub fn export_report<S: Serialize>(
    stats: &[BucketStat],
    summary: &S,
    stem: &Path,
) -> Result<ReportArtifacts> {
    let artifacts = ReportArtifacts {
        parquet_path: stem.with_extension("parquet"),
        csv_path: stem.with_extension("csv"),
        summary_path: stem.with_extension("json"),
    };

    let mut frame = bucket_stats_to_frame(stats)?;
    let parquet_bytes = create_parquet_bytes(&mut frame)?;
    let csv_bytes = create_csv_bytes(stats)?;
    let summary_bytes = serde_json::to_vec_pretty(summary)?;

    write_atomic(&artifacts.parquet_path, &parquet_bytes)?;
    write_atomic(&artifacts.csv_path, &csv_bytes)?;
    write_atomic(&artifacts.summary_path, &summary_bytes)?;

    info!(
        windows = stats.len(),
        parquet = %artifacts.parquet_path.display(),
        "Report exported"
    );

    Ok(artifacts)
}

pub fn load_report(path: &Path) -> Result<Vec<BucketStat>> {
    bucket_stats_from_frame(&read_parquet(path)?)
}

pub fn write_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    let mut clone = df.clone();
    let bytes = create_parquet_bytes(&mut clone)?;
    write_atomic(path, &bytes)
}

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

pub fn read_parquet_bytes(bytes: &[u8]) -> Result<DataFrame> {
    Ok(ParquetReader::new(Cursor::new(bytes)).finish()?)
}

pub fn create_parquet_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        ParquetWriter::new(&mut cursor)
            .with_compression(ParquetCompression::Zstd(None))
            .with_statistics(StatisticsOptions::default())
            .finish(df)?;
    }
    Ok(buffer)
}

fn create_csv_bytes(stats: &[BucketStat]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for stat in stats {
        writer.serialize(ReportRow {
            window_start: stat.window_start,
            h_max: stat.h_max,
            h_1_3_mean: stat.h_1_3_mean,
            end_times: stat.window_end,
        })?;
    }
    writer
        .into_inner()
        .map_err(|err| PipelineError::Io(std::io::Error::other(err.to_string())))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| PipelineError::Config(format!("{} has no file name", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
