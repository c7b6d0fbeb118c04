//! Sampling-period floor and common start across all input streams.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FeatureError;
use crate::series::StreamSet;

const MIN_OBSERVATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SamplingEstimator {
    /// Gap between the first two observations.
    #[default]
    FirstPair,
    /// Median of all consecutive gaps.
    MedianDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSampling {
    pub alias: String,
    pub period_seconds: u64,
    pub first_ts_ms_utc: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingFloor {
    /// Largest per-alias sampling period.
    pub floor_seconds: u64,
    /// Earliest first observation across aliases.
    pub start_ts_ms_utc: i64,
    pub per_alias: Vec<AliasSampling>,
}

pub fn reconcile_sampling(
    streams: &StreamSet,
    estimator: SamplingEstimator,
) -> Result<SamplingFloor, FeatureError> {
    if streams.is_empty() {
        return Err(FeatureError::EmptyStreamSet);
    }

    let mut per_alias = Vec::with_capacity(streams.len());
    for (alias, series) in streams {
        let ts = series.timestamps();
        if ts.len() < MIN_OBSERVATIONS {
            return Err(FeatureError::InsufficientData {
                alias: alias.clone(),
                found: ts.len(),
                required: MIN_OBSERVATIONS,
            });
        }

        let period_ms = match estimator {
            SamplingEstimator::FirstPair => ts[1] - ts[0],
            SamplingEstimator::MedianDelta => median_delta(ts),
        };
        per_alias.push(AliasSampling {
            alias: alias.clone(),
            // Whole seconds, truncated.
            period_seconds: (period_ms / 1_000) as u64,
            first_ts_ms_utc: ts[0],
        });
    }

    let floor_seconds = per_alias
        .iter()
        .map(|a| a.period_seconds)
        .max()
        .unwrap_or(0);
    let start_ts_ms_utc = per_alias
        .iter()
        .map(|a| a.first_ts_ms_utc)
        .min()
        .unwrap_or(0);

    info!(
        component = "reconcile",
        event = "reconcile.floor",
        estimator = ?estimator,
        aliases = per_alias.len(),
        floor_seconds = floor_seconds,
        start_ts_ms_utc = start_ts_ms_utc
    );

    Ok(SamplingFloor {
        floor_seconds,
        start_ts_ms_utc,
        per_alias,
    })
}

fn median_delta(ts: &[i64]) -> i64 {
    let mut deltas: Vec<i64> = ts.windows(2).map(|pair| pair[1] - pair[0]).collect();
    deltas.sort_unstable();
    let mid = deltas.len() / 2;
    if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) / 2
    } else {
        deltas[mid]
    }
}
