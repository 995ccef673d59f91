use chrono::{Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use hebtools_core::buckets::{aggregate, aggregate_frame, BucketAccumulator};
use hebtools_core::{BoundaryPolicy, PipelineError, WaveHeightSample};

const HALF_HOUR: i64 = 1800;

fn midnight() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2013, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn at(minutes: i64, wave_height: f64) -> WaveHeightSample {
    WaveHeightSample {
        timestamp: midnight() + Duration::minutes(minutes),
        wave_height,
    }
}

/// Samples every ten minutes from 00:10 to 02:00 inclusive.
fn ten_minute_series() -> Vec<WaveHeightSample> {
    (1..=12)
        .map(|step| at(step * 10, (step * 7 % 11) as f64 * 10.0))
        .collect()
}

fn wave_frame(samples: &[WaveHeightSample]) -> DataFrame {
    let timestamps: Vec<i64> = samples
        .iter()
        .map(|s| s.timestamp.and_utc().timestamp_micros())
        .collect();
    let heights: Vec<f64> = samples.iter().map(|s| s.wave_height).collect();
    df![
        "timestamp" => timestamps,
        "wave_height" => heights,
    ]
    .unwrap()
    .lazy()
    .with_column(
        col("timestamp")
            .cast(DataType::Datetime(TimeUnit::Microseconds, None))
            .alias("timestamp"),
    )
    .collect()
    .unwrap()
}

#[test]
fn two_hours_of_ten_minute_samples_make_four_windows() -> hebtools_core::Result<()> {
    let samples = ten_minute_series();
    let stats = aggregate(&samples, HALF_HOUR, BoundaryPolicy::CoverAll)?;

    assert_eq!(stats.len(), 4);
    for (idx, window) in stats.iter().enumerate() {
        let members = &samples[idx * 3..idx * 3 + 3];
        assert_eq!(window.window_start, members[0].timestamp);
        assert_eq!(window.window_end, members[2].timestamp);

        let max = members
            .iter()
            .map(|s| s.wave_height)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(window.h_max, max);
        // floor(3 / 3) = 1, so the top third is just the maximum.
        assert_eq!(window.h_1_3_mean, max);
    }
    Ok(())
}

#[test]
fn input_order_does_not_matter() -> hebtools_core::Result<()> {
    let samples = ten_minute_series();
    let mut shuffled = samples.clone();
    shuffled.reverse();
    shuffled.swap(2, 9);

    let sorted = aggregate(&samples, HALF_HOUR, BoundaryPolicy::CoverAll)?;
    let unsorted = aggregate(&shuffled, HALF_HOUR, BoundaryPolicy::CoverAll)?;
    assert_eq!(sorted, unsorted);
    Ok(())
}

#[test]
fn single_sample_window_has_nan_top_third() -> hebtools_core::Result<()> {
    let stats = aggregate(&[at(70, 145.0)], HALF_HOUR, BoundaryPolicy::CoverAll)?;

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].h_max, 145.0);
    assert!(stats[0].h_1_3_mean.is_nan());
    assert!(stats[0].is_degenerate());
    assert_eq!(stats[0].window_start, stats[0].window_end);
    Ok(())
}

#[test]
fn sample_on_a_boundary_closes_the_earlier_window() -> hebtools_core::Result<()> {
    let samples = vec![at(10, 1.0), at(30, 2.0), at(31, 3.0)];
    let stats = aggregate(&samples, HALF_HOUR, BoundaryPolicy::CoverAll)?;

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].window_end, at(30, 0.0).timestamp);
    assert_eq!(stats[0].h_max, 2.0);
    assert_eq!(stats[1].window_start, at(31, 0.0).timestamp);
    Ok(())
}

#[test]
fn empty_windows_are_skipped_and_order_is_kept() -> hebtools_core::Result<()> {
    // A full day gap between the two bursts.
    let samples = vec![
        at(5, 1.0),
        at(10, 2.0),
        at(24 * 60 + 5, 3.0),
        at(24 * 60 + 50, 4.0),
    ];
    let stats = aggregate(&samples, HALF_HOUR, BoundaryPolicy::CoverAll)?;

    assert_eq!(stats.len(), 3);
    assert!(stats
        .windows(2)
        .all(|pair| pair[0].window_end < pair[1].window_start));
    assert_eq!(stats[2].h_max, 4.0);
    Ok(())
}

#[test]
fn top_third_averages_highest_values() -> hebtools_core::Result<()> {
    let heights = [3.0, 9.0, 1.0, 7.0, 5.0, 8.0];
    let samples: Vec<WaveHeightSample> = heights
        .iter()
        .enumerate()
        .map(|(idx, h)| at(1 + idx as i64, *h))
        .collect();

    let stats = aggregate(&samples, HALF_HOUR, BoundaryPolicy::CoverAll)?;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].h_max, 9.0);
    assert_eq!(stats[0].h_1_3_mean, 8.5);
    Ok(())
}

#[test]
fn legacy_boundaries_drop_a_trailing_window_that_rounds_down() -> hebtools_core::Result<()> {
    let mut samples = ten_minute_series();
    samples.push(at(130, 42.0));

    let cover_all = aggregate(&samples, HALF_HOUR, BoundaryPolicy::CoverAll)?;
    let legacy = aggregate(&samples, HALF_HOUR, BoundaryPolicy::LegacyRounded)?;

    assert_eq!(cover_all.len(), 5);
    assert_eq!(cover_all[4].h_max, 42.0);
    assert!(cover_all[4].h_1_3_mean.is_nan());

    assert_eq!(legacy.len(), 4);
    assert_eq!(&cover_all[..4], &legacy[..]);
    Ok(())
}

#[test]
fn legacy_boundaries_keep_a_trailing_window_that_rounds_up() -> hebtools_core::Result<()> {
    let mut samples = ten_minute_series();
    samples.push(at(140, 42.0));

    let legacy = aggregate(&samples, HALF_HOUR, BoundaryPolicy::LegacyRounded)?;
    assert_eq!(legacy.len(), 5);
    Ok(())
}

#[test]
fn frames_can_be_folded_in_any_order() -> hebtools_core::Result<()> {
    let samples = ten_minute_series();
    let (early, late) = samples.split_at(5);

    let mut acc = BucketAccumulator::new(HALF_HOUR, BoundaryPolicy::CoverAll);
    assert_eq!(acc.push_frame(&wave_frame(late))?, late.len());
    assert_eq!(acc.push_frame(&wave_frame(early))?, early.len());
    assert_eq!(acc.sample_count(), samples.len());
    let folded = acc.finish()?;

    let whole = aggregate_frame(&wave_frame(&samples), HALF_HOUR, BoundaryPolicy::CoverAll)?;
    assert_eq!(folded, whole);
    assert_eq!(whole.len(), 4);
    Ok(())
}

#[test]
fn hour_buckets_merge_half_hours() -> hebtools_core::Result<()> {
    let stats = aggregate(&ten_minute_series(), 3600, BoundaryPolicy::CoverAll)?;
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].window_end, at(60, 0.0).timestamp);
    Ok(())
}

#[test]
fn empty_series_yields_no_windows() -> hebtools_core::Result<()> {
    assert!(aggregate(&[], HALF_HOUR, BoundaryPolicy::CoverAll)?.is_empty());
    Ok(())
}

#[test]
fn frame_without_wave_height_is_rejected() {
    let df = wave_frame(&ten_minute_series())
        .drop("wave_height")
        .unwrap();
    let err = aggregate_frame(&df, HALF_HOUR, BoundaryPolicy::CoverAll).unwrap_err();
    assert!(matches!(err, PipelineError::InputContract { .. }));
}

#[test]
fn timestamps_must_be_datetimes() {
    let df = df!(
        "timestamp" => &[0i64, 1],
        "wave_height" => &[1.0f64, 2.0],
    )
    .unwrap();
    let err = aggregate_frame(&df, HALF_HOUR, BoundaryPolicy::CoverAll).unwrap_err();
    assert!(matches!(err, PipelineError::InputContract { .. }));
}

#[test]
fn window_start_never_precedes_its_boundary() -> hebtools_core::Result<()> {
    let samples = ten_minute_series();
    let stats = aggregate(&samples, HALF_HOUR, BoundaryPolicy::CoverAll)?;
    for window in &stats {
        let start = window.window_start.and_utc().timestamp();
        let end = window.window_end.and_utc().timestamp();
        let boundary = (end + HALF_HOUR - 1).div_euclid(HALF_HOUR) * HALF_HOUR;
        assert!(start > boundary - HALF_HOUR);
        assert!(end <= boundary);
    }
    Ok(())
}

fn nanosecond_frame(nanos: &[i64], heights: &[f64]) -> DataFrame {
    df![
        "timestamp" => nanos,
        "wave_height" => heights,
    ]
    .unwrap()
    .lazy()
    .with_column(
        col("timestamp")
            .cast(DataType::Datetime(TimeUnit::Nanoseconds, None))
            .alias("timestamp"),
    )
    .collect()
    .unwrap()
}

#[test]
fn nanoseconds_past_a_boundary_open_the_next_window() -> hebtools_core::Result<()> {
    let boundary = (midnight() + Duration::minutes(30))
        .and_utc()
        .timestamp_nanos_opt()
        .unwrap();
    let earlier = boundary - 600 * 1_000_000_000;
    let df = nanosecond_frame(&[earlier, boundary + 500], &[1.0, 2.0]);

    let stats = aggregate_frame(&df, HALF_HOUR, BoundaryPolicy::CoverAll)?;

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].h_max, 1.0);
    assert_eq!(stats[0].window_end, at(20, 0.0).timestamp);
    assert_eq!(stats[1].h_max, 2.0);
    assert_eq!(
        stats[1].window_start,
        at(30, 0.0).timestamp + Duration::nanoseconds(500)
    );
    Ok(())
}

#[test]
fn sub_microsecond_times_survive_the_report_frame() -> hebtools_core::Result<()> {
    let start = (midnight() + Duration::minutes(1))
        .and_utc()
        .timestamp_nanos_opt()
        .unwrap()
        + 123;
    let df = nanosecond_frame(&[start, start + 7], &[3.0, 4.0]);
    let stats = aggregate_frame(&df, HALF_HOUR, BoundaryPolicy::CoverAll)?;

    let reloaded = hebtools_core::outputs::bucket_stats_from_frame(
        &hebtools_core::outputs::bucket_stats_to_frame(&stats)?,
    )?;
    assert_eq!(reloaded[0].window_start, stats[0].window_start);
    assert_eq!(
        reloaded[0].window_end - reloaded[0].window_start,
        Duration::nanoseconds(7)
    );
    Ok(())
}

#[test]
fn timestamps_beyond_nanosecond_range_are_rejected() {
    let far_future = NaiveDate::from_ymd_opt(2300, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let err = aggregate(
        &[WaveHeightSample {
            timestamp: far_future,
            wave_height: 1.0,
        }],
        HALF_HOUR,
        BoundaryPolicy::CoverAll,
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::InputContract { .. }));
}
