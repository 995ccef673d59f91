//! Typed column extraction with input-contract checks.
//!
//! Every pipeline stage pulls its inputs through these helpers so that a
//! missing column, an unexpected dtype or a null in a required field aborts
//! the run with a `PipelineError::InputContract` naming the column.

use polars::prelude::*;

use crate::error::{PipelineError, Result};

pub(crate) const TIMESTAMP_DTYPE: DataType = DataType::Datetime(TimeUnit::Nanoseconds, None);

fn require<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PipelineError::contract(name, "column is missing"))
}

fn reject_nulls(column: &Column, name: &str) -> Result<()> {
    let nulls = column.null_count();
    if nulls > 0 {
        return Err(PipelineError::contract(
            name,
            format!("{nulls} null value(s) in a required field"),
        ));
    }
    Ok(())
}

/// Casts `name` to a naive nanosecond datetime column. Coarser units widen
/// losslessly; values that overflow the nanosecond range are rejected.
pub(crate) fn datetime_column(df: &DataFrame, name: &str) -> Result<Column> {
    let column = require(df, name)?;
    if !matches!(column.dtype(), DataType::Datetime(_, _)) {
        return Err(PipelineError::contract(
            name,
            format!("expected a datetime column, found {}", column.dtype()),
        ));
    }
    reject_nulls(column, name)?;
    let cast = column.cast(&TIMESTAMP_DTYPE)?;
    if cast.null_count() > 0 {
        return Err(PipelineError::contract(
            name,
            "timestamps outside the nanosecond range",
        ));
    }
    Ok(cast)
}

pub(crate) fn datetime_nanos(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = datetime_column(df, name)?;
    let values = column.datetime()?;
    (0..values.len())
        .map(|idx| {
            values
                .get(idx)
                .ok_or_else(|| PipelineError::contract(name, format!("row {idx} is null")))
        })
        .collect()
}

pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = require(df, name)?;
    if !column.dtype().is_primitive_numeric() {
        return Err(PipelineError::contract(
            name,
            format!("expected a numeric column, found {}", column.dtype()),
        ));
    }
    reject_nulls(column, name)?;
    let cast = column.cast(&DataType::Float64)?;
    let values = cast.f64()?;
    (0..values.len())
        .map(|idx| {
            values
                .get(idx)
                .ok_or_else(|| PipelineError::contract(name, format!("row {idx} is null")))
        })
        .collect()
}

pub(crate) fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = require(df, name)?;
    if !column.dtype().is_integer() {
        return Err(PipelineError::contract(
            name,
            format!("expected an integer column, found {}", column.dtype()),
        ));
    }
    reject_nulls(column, name)?;
    let cast = column.cast(&DataType::Int64)?;
    let values = cast.i64()?;
    (0..values.len())
        .map(|idx| {
            values
                .get(idx)
                .ok_or_else(|| PipelineError::contract(name, format!("row {idx} is null")))
        })
        .collect()
}

pub(crate) fn bool_values(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let column = require(df, name)?;
    reject_nulls(column, name)?;
    let values = column
        .bool()
        .map_err(|_| PipelineError::contract(name, "expected a boolean column"))?;
    (0..values.len())
        .map(|idx| {
            values
                .get(idx)
                .ok_or_else(|| PipelineError::contract(name, format!("row {idx} is null")))
        })
        .collect()
}

pub(crate) fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = require(df, name)?;
    reject_nulls(column, name)?;
    let values = column
        .str()
        .map_err(|_| PipelineError::contract(name, "expected a string column"))?;
    (0..values.len())
        .map(|idx| {
            values
                .get(idx)
                .map(str::to_string)
                .ok_or_else(|| PipelineError::contract(name, format!("row {idx} is null")))
        })
        .collect()
}

/// Reads a nullable float column; absent values stay `None`.
pub(crate) fn optional_f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require(df, name)?;
    let cast = column.cast(&DataType::Float64)?;
    let values = cast.f64()?;
    Ok((0..values.len()).map(|idx| values.get(idx)).collect())
}

/// Builds a naive nanosecond datetime column from epoch nanos.
pub(crate) fn datetime_series(name: &str, nanos: Vec<i64>) -> Result<Series> {
    Ok(Series::new(name.into(), nanos).cast(&TIMESTAMP_DTYPE)?)
}
