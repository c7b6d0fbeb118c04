//! Column-oriented feature tables sharing one time index.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FeatureError;
use crate::series::Series;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    index: Vec<i64>,
    step_ms: Option<i64>,
    columns: Vec<FeatureColumn>,
}

impl FeatureTable {
    pub fn new(index: Vec<i64>, step_ms: Option<i64>) -> Self {
        Self {
            index,
            step_ms,
            columns: Vec::new(),
        }
    }

    /// Table holding the series values as its single column, named after
    /// the series.
    pub fn from_series(series: &Series, step_ms: Option<i64>) -> Self {
        Self {
            index: series.timestamps().to_vec(),
            step_ms,
            columns: vec![FeatureColumn {
                name: series.name().to_string(),
                values: series.values().to_vec(),
            }],
        }
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn step_ms(&self) -> Option<i64> {
        self.step_ms
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), FeatureError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(FeatureError::DuplicateColumn(name));
        }
        if values.len() != self.index.len() {
            return Err(FeatureError::ColumnLength {
                name,
                expected: self.index.len(),
                found: values.len(),
            });
        }
        self.columns.push(FeatureColumn { name, values });
        Ok(())
    }

    /// Value at `row` of every column, in column order.
    pub fn row(&self, row: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|c| c.values[row]).collect()
    }

    pub fn row_is_complete(&self, row: usize) -> bool {
        self.columns.iter().all(|c| c.values[row].is_some())
    }

    /// Fails on the first pair of adjacent timestamps that are not exactly
    /// one nominal step apart. Tables without a step are only checked for
    /// strict ordering.
    pub fn check_regular(&self) -> Result<(), FeatureError> {
        for pair in self.index.windows(2) {
            let expected = match self.step_ms {
                Some(step) => pair[0] + step,
                None if pair[1] > pair[0] => continue,
                None => pair[0] + 1,
            };
            if pair[1] != expected {
                return Err(FeatureError::GridGap {
                    expected_next_ts_ms_utc: expected,
                    actual_ts_ms_utc: pair[1],
                    step_ms: self.step_ms.unwrap_or(0),
                });
            }
        }
        Ok(())
    }

    /// Hex SHA-256 over the index, column names and raw value bits.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("step:{:?};rows:{};", self.step_ms, self.index.len()));
        for ts in &self.index {
            hasher.update(ts.to_le_bytes());
        }
        for column in &self.columns {
            hasher.update(column.name.as_bytes());
            hasher.update(b":");
            for value in &column.values {
                match value {
                    Some(v) => {
                        hasher.update([1u8]);
                        hasher.update(v.to_bits().to_le_bytes());
                    }
                    None => hasher.update([0u8]),
                }
            }
            hasher.update(b";");
        }
        hex::encode(hasher.finalize())
    }

    /// Copy of this table keeping only the rows whose position is `true`.
    pub(crate) fn filter_rows(&self, keep: &[bool]) -> Self {
        let index = self
            .index
            .iter()
            .zip(keep)
            .filter_map(|(ts, k)| k.then_some(*ts))
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|c| FeatureColumn {
                name: c.name.clone(),
                values: c
                    .values
                    .iter()
                    .zip(keep)
                    .filter_map(|(v, k)| k.then_some(*v))
                    .collect(),
            })
            .collect();
        Self {
            index,
            step_ms: self.step_ms,
            columns,
        }
    }
}
