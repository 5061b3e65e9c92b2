//! Brings series from different sources onto one unit and one length.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::reading::{FlowPoint, FlowSeries, FlowUnit};

/// Cubic metres in one cubic foot.
pub const CFS_TO_CMS: f64 = 0.0283168;

pub fn cfs_to_cms(cfs: f64) -> f64 {
    cfs * CFS_TO_CMS
}

/// Converts a cfs series to cms; a cms series passes through unchanged.
pub fn to_metric(series: FlowSeries) -> FlowSeries {
    match series.unit {
        FlowUnit::CubicMetersPerSecond => series,
        FlowUnit::CubicFeetPerSecond => {
            let points = series
                .points
                .into_iter()
                .map(|p| FlowPoint {
                    time: p.time,
                    value: cfs_to_cms(p.value),
                })
                .collect();
            FlowSeries::new(series.source, FlowUnit::CubicMetersPerSecond, points)
        }
    }
}

/// Cuts every series to the length of the shortest one, keeping the first
/// values of each.
pub fn truncate_to_shortest(mut series: Vec<FlowSeries>) -> Vec<FlowSeries> {
    let Some(shortest) = series.iter().map(FlowSeries::len).min() else {
        return series;
    };

    if shortest == 0 {
        warn!("At least one series is empty; nothing to compare");
    }

    for s in series.iter_mut() {
        if s.len() > shortest {
            debug!("Dropping {} trailing values of {}", s.len() - shortest, s.source.label());
        }
        s.points.truncate(shortest);
    }

    series
}

/// Converts every series to cms, then aligns them by position.
pub fn normalize(series: Vec<FlowSeries>) -> Vec<FlowSeries> {
    truncate_to_shortest(series.into_iter().map(to_metric).collect())
}

/// Averages a series into one bucket per clock hour, from the hour of the
/// first point to the hour of the last. Missing values are ignored; an hour
/// with no finite value left is `NaN`. Input must be sorted by time.
pub fn resample_hourly(series: &FlowSeries) -> FlowSeries {
    let (Some(first), Some(last)) = (series.points.first(), series.points.last()) else {
        return FlowSeries::new(series.source, series.unit, Vec::new());
    };

    let origin = start_of_hour(first.time);
    let hours = (start_of_hour(last.time) - origin).num_hours().max(0) as usize + 1;
    let mut buckets = vec![(0.0, 0u32); hours];

    for p in &series.points {
        let index = (start_of_hour(p.time) - origin).num_hours();
        let Some(bucket) = usize::try_from(index).ok().and_then(|i| buckets.get_mut(i)) else {
            continue;
        };
        if p.value.is_finite() {
            bucket.0 += p.value;
            bucket.1 += 1;
        }
    }

    let points = buckets
        .into_iter()
        .enumerate()
        .map(|(i, (sum, count))| FlowPoint {
            time: origin + Duration::hours(i as i64),
            value: mean(sum, count),
        })
        .collect();

    FlowSeries::new(series.source, series.unit, points)
}

fn mean(sum: f64, count: u32) -> f64 {
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn start_of_hour(time: DateTime<Utc>) -> DateTime<Utc> {
    let seconds = time.timestamp();
    DateTime::from_timestamp(seconds - seconds.rem_euclid(3600), 0).unwrap_or(time)
}

// -- Tests -------------------------------------------------------------------
