//! Error taxonomy shared by the alignment and feature stages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Configuration,
    InsufficientData,
    Alignment,
    Input,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeatureError {
    #[error("invalid period '{0}'")]
    InvalidPeriod(String),
    #[error("unknown interpolation method '{0}'")]
    UnknownInterpolationMethod(String),
    #[error("interpolation method '{method}' does not support order {order:?}")]
    UnsupportedInterpolationOrder { method: String, order: Option<u32> },
    #[error("unknown statistic '{0}'")]
    UnknownStatistic(String),
    #[error("window size list is empty")]
    EmptyWindowList,
    #[error("statistic list is empty")]
    EmptyStatisticList,
    #[error("input stream set is empty")]
    EmptyStreamSet,
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("column '{name}' has {found} values, index has {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("series '{alias}' has {found} observations, at least {required} required")]
    InsufficientData {
        alias: String,
        found: usize,
        required: usize,
    },
    #[error("series '{alias}' has no value that interpolation can resolve")]
    UnresolvedInterpolation { alias: String },
    #[error("series '{alias}' timestamps are not strictly increasing at position {position}")]
    NonIncreasingIndex { alias: String, position: usize },
    #[error("grid gap from {expected_next_ts_ms_utc} to {actual_ts_ms_utc} (step {step_ms}ms)")]
    GridGap {
        expected_next_ts_ms_utc: i64,
        actual_ts_ms_utc: i64,
        step_ms: i64,
    },
    #[error("invalid UTC timestamp: {0}")]
    InvalidTimestamp(i64),
    #[error("no time overlap across {tables} joined tables")]
    NoTimeOverlap { tables: usize },
}

impl FeatureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPeriod(_)
            | Self::UnknownInterpolationMethod(_)
            | Self::UnsupportedInterpolationOrder { .. }
            | Self::UnknownStatistic(_)
            | Self::EmptyWindowList
            | Self::EmptyStatisticList
            | Self::EmptyStreamSet
            | Self::UnknownColumn(_)
            | Self::DuplicateColumn(_) => ErrorKind::Configuration,
            Self::InsufficientData { .. } | Self::UnresolvedInterpolation { .. } => {
                ErrorKind::InsufficientData
            }
            Self::NoTimeOverlap { .. } | Self::GridGap { .. } => ErrorKind::Alignment,
            Self::ColumnLength { .. }
            | Self::NonIncreasingIndex { .. }
            | Self::InvalidTimestamp(_) => ErrorKind::Input,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
