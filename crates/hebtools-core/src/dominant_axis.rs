use polars::prelude::*;

use crate::columns;
use crate::error::Result;
use crate::types::{Axis, COL_DOMINANT_AXIS, COL_MAX_STD_FACTOR};

/// Adds `max_std_factor` and `dominant_axis` to a table that already carries
/// the per-axis `<axis>_file_std` columns.
///
/// For each row the ratio `|value| / std` is computed per axis and the axis
/// whose ratio is strictly greater than the other two wins. Exact ties go to
/// the earlier axis in heave, north, west order. Rows where any ratio is
/// undefined (no baseline, or zero over zero) get nulls.
pub fn rank_dominant_axis(df: &DataFrame) -> Result<DataFrame> {
    let len = df.height();

    let mut values = Vec::with_capacity(Axis::ALL.len());
    let mut stds = Vec::with_capacity(Axis::ALL.len());
    for axis in Axis::ALL {
        values.push(columns::f64_values(df, axis.column())?);
        stds.push(columns::optional_f64_values(df, axis.std_column())?);
    }

    let mut factors: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut winners: Vec<Option<&'static str>> = Vec::with_capacity(len);

    for idx in 0..len {
        let ratios = [
            std_ratio(values[0][idx], stds[0][idx]),
            std_ratio(values[1][idx], stds[1][idx]),
            std_ratio(values[2][idx], stds[2][idx]),
        ];
        match dominant(ratios) {
            Some((axis, factor)) => {
                factors.push(Some(factor));
                winners.push(Some(axis.column()));
            }
            None => {
                factors.push(None);
                winners.push(None);
            }
        }
    }

    let mut output = df.clone();
    output.with_column(Series::new(COL_MAX_STD_FACTOR.into(), factors))?;
    output.with_column(Series::new(COL_DOMINANT_AXIS.into(), winners))?;
    Ok(output)
}

/// Row counts won by each axis, in heave, north, west order.
pub fn dominant_axis_counts(df: &DataFrame) -> Result<[(Axis, usize); 3]> {
    let column = df.column(COL_DOMINANT_AXIS)?;
    let winners = column.str()?;
    let mut counts = [(Axis::Heave, 0), (Axis::North, 0), (Axis::West, 0)];
    for winner in winners.into_iter().flatten() {
        if let Some(slot) = counts.iter_mut().find(|(axis, _)| axis.column() == winner) {
            slot.1 += 1;
        }
    }
    Ok(counts)
}

fn std_ratio(value: f64, std: Option<f64>) -> Option<f64> {
    let ratio = (value / std?).abs();
    if ratio.is_nan() {
        None
    } else {
        Some(ratio)
    }
}

fn dominant(ratios: [Option<f64>; 3]) -> Option<(Axis, f64)> {
    let mut best: Option<(Axis, f64)> = None;
    for (axis, ratio) in Axis::ALL.into_iter().zip(ratios) {
        let ratio = ratio?;
        match best {
            Some((_, current)) if ratio <= current => {}
            _ => best = Some((axis, ratio)),
        }
    }
    best
}
