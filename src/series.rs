//! Single-variable time series as consumed by the alignment stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FeatureError;

/// Streams keyed by alias. Ordered so every pass visits aliases identically.
pub type StreamSet = BTreeMap<String, Series>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    timestamps: Vec<i64>,
    values: Vec<Option<f64>>,
}

impl Series {
    /// Builds a series; timestamps are UTC milliseconds and must be strictly
    /// increasing. Non-finite values are stored as missing.
    pub fn new(
        name: impl Into<String>,
        timestamps: Vec<i64>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, FeatureError> {
        let name = name.into();
        if timestamps.len() != values.len() {
            return Err(FeatureError::ColumnLength {
                name,
                expected: timestamps.len(),
                found: values.len(),
            });
        }
        if let Some(position) = timestamps.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(FeatureError::NonIncreasingIndex {
                alias: name,
                position: position + 1,
            });
        }

        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        Ok(Self {
            name,
            timestamps,
            values,
        })
    }

    pub fn from_points(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (i64, f64)>,
    ) -> Result<Self, FeatureError> {
        let (timestamps, values): (Vec<i64>, Vec<Option<f64>>) =
            points.into_iter().map(|(ts, v)| (ts, Some(v))).unzip();
        Self::new(name, timestamps, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_ts(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<i64>, Vec<Option<f64>>) {
        (self.name, self.timestamps, self.values)
    }
}
