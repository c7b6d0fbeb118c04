//! Gap filling and re-gridding of one stream onto a fixed frequency.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FeatureError;
use crate::interpolate::{fill_interior, InterpolationMethod};
use crate::period::{parse_period, Period};
use crate::series::Series;

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleConfig {
    pub frequency: Period,
    pub method: InterpolationMethod,
}

impl ResampleConfig {
    /// Parses the frequency and method up front so that a bad name fails
    /// before any stream is processed.
    pub fn parse(frequency: &str, method: &str, order: Option<u32>) -> Result<Self, FeatureError> {
        Ok(Self {
            frequency: parse_period(frequency)?,
            method: InterpolationMethod::parse(method, order)?,
        })
    }

    pub fn step_ms(&self) -> i64 {
        self.frequency.millis()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleReport {
    pub native_points: u64,
    pub native_missing_filled: u64,
    pub grid_points: u64,
    pub empty_buckets_filled: u64,
    /// Grid buckets at either edge with no neighbour to interpolate from.
    pub boundary_missing: u64,
}

/// Interpolates interior gaps at the native timestamps, averages into
/// left-closed buckets anchored at the UTC midnight of the first
/// observation, then interpolates buckets that received no sample.
pub fn interpolate_and_resample(
    series: &Series,
    cfg: &ResampleConfig,
) -> Result<(Series, ResampleReport), FeatureError> {
    let timestamps = series.timestamps();
    let (first_ts, last_ts) = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(FeatureError::InsufficientData {
                alias: series.name().to_string(),
                found: 0,
                required: 1,
            })
        }
    };

    let native = fill_interior(cfg.method, timestamps, series.values());
    let native_missing_filled = series
        .values()
        .iter()
        .zip(&native)
        .filter(|(before, after)| before.is_none() && after.is_some())
        .count() as u64;

    let step = cfg.step_ms();
    let origin = first_ts.div_euclid(DAY_MS) * DAY_MS;
    let first_bucket = (first_ts - origin).div_euclid(step);
    let last_bucket = (last_ts - origin).div_euclid(step);
    let bucket_count = (last_bucket - first_bucket + 1) as usize;

    let mut sums = vec![0.0; bucket_count];
    let mut counts = vec![0u32; bucket_count];
    for (ts, value) in timestamps.iter().zip(&native) {
        if let Some(v) = value {
            let slot = ((ts - origin).div_euclid(step) - first_bucket) as usize;
            sums[slot] += v;
            counts[slot] += 1;
        }
    }

    let grid: Vec<i64> = (0..bucket_count as i64)
        .map(|offset| origin + (first_bucket + offset) * step)
        .collect();
    let means: Vec<Option<f64>> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, count)| (*count > 0).then(|| sum / f64::from(*count)))
        .collect();
    let empty_buckets = means.iter().filter(|v| v.is_none()).count() as u64;

    let regridded = fill_interior(cfg.method, &grid, &means);
    let boundary_missing = regridded.iter().filter(|v| v.is_none()).count() as u64;
    if boundary_missing == bucket_count as u64 {
        return Err(FeatureError::UnresolvedInterpolation {
            alias: series.name().to_string(),
        });
    }

    let report = ResampleReport {
        native_points: series.len() as u64,
        native_missing_filled,
        grid_points: bucket_count as u64,
        empty_buckets_filled: empty_buckets - boundary_missing,
        boundary_missing,
    };

    if boundary_missing > 0 {
        warn!(
            component = "resample",
            event = "resample.boundary_missing",
            alias = series.name(),
            boundary_missing = boundary_missing,
            frequency = %cfg.frequency
        );
    }
    debug!(
        component = "resample",
        event = "resample.finish",
        alias = series.name(),
        method = %cfg.method,
        frequency = %cfg.frequency,
        native_points = report.native_points,
        grid_points = report.grid_points,
        empty_buckets_filled = report.empty_buckets_filled
    );

    let resampled = Series::new(series.name(), grid, regridded)?;
    Ok((resampled, report))
}
