//! CSV reading and writing for per-alias streams and feature tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::StringRecord;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::FeatureError;
use crate::series::{Series, StreamSet};
use crate::table::FeatureTable;

const TIME_COLUMN: &str = "time";
const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NAIVE_TIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{path} has no 'time' column")]
    MissingTimeColumn { path: PathBuf },
    #[error("{path} has {found} value columns, expected exactly 1")]
    ValueColumns { path: PathBuf, found: usize },
    #[error("failed to parse {field} value '{value}' at row {row}")]
    ParseField {
        field: &'static str,
        value: String,
        row: usize,
    },
    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Reads a two-column CSV (`time` plus one value column) into a series
/// named `alias`.
pub fn read_series_csv(path: &Path, alias: &str) -> Result<Series, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h == TIME_COLUMN)
        .ok_or_else(|| StoreError::MissingTimeColumn {
            path: path.to_path_buf(),
        })?;
    let value_columns: Vec<usize> = (0..headers.len()).filter(|idx| *idx != time_idx).collect();
    let &[value_idx] = value_columns.as_slice() else {
        return Err(StoreError::ValueColumns {
            path: path.to_path_buf(),
            found: value_columns.len(),
        });
    };

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        timestamps.push(parse_time(&record, time_idx, row)?);
        values.push(parse_value(&record, value_idx, row)?);
    }

    let series = Series::new(alias, timestamps, values)?;
    debug!(
        component = "store",
        event = "store.series.read",
        alias = alias,
        path = %path.display(),
        rows = series.len(),
        missing = series.missing_count()
    );
    Ok(series)
}

/// Loads every alias in `files` (alias -> file name) from `data_dir`.
pub fn read_stream_set(
    data_dir: &Path,
    files: &BTreeMap<String, String>,
) -> Result<StreamSet, StoreError> {
    let mut streams = StreamSet::new();
    for (alias, file_name) in files {
        let series = read_series_csv(&data_dir.join(file_name), alias)?;
        streams.insert(alias.clone(), series);
    }
    info!(
        component = "store",
        event = "store.streams.read",
        data_dir = %data_dir.display(),
        aliases = streams.len()
    );
    Ok(streams)
}

/// Writes `time` followed by every column; missing cells are empty.
pub fn write_table_csv(path: &Path, table: &FeatureTable) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![TIME_COLUMN.to_string()];
    header.extend(table.column_names().into_iter().map(str::to_string));
    writer.write_record(&header)?;

    for (row, ts) in table.index().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(format_time(*ts)?);
        record.extend(
            table
                .row(row)
                .into_iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!(
        component = "store",
        event = "store.table.written",
        path = %path.display(),
        rows = table.len(),
        column_count = table.columns().len()
    );
    Ok(())
}

pub fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn format_time(ts_ms_utc: i64) -> Result<String, StoreError> {
    let dt = Utc
        .timestamp_millis_opt(ts_ms_utc)
        .single()
        .ok_or(FeatureError::InvalidTimestamp(ts_ms_utc))?;
    Ok(dt.format(OUTPUT_TIME_FORMAT).to_string())
}

fn parse_time(record: &StringRecord, idx: usize, row: usize) -> Result<i64, StoreError> {
    let raw = record.get(idx).unwrap_or_default();
    parse_timestamp(raw).ok_or_else(|| StoreError::ParseField {
        field: "time",
        value: raw.to_string(),
        row,
    })
}

fn parse_value(record: &StringRecord, idx: usize, row: usize) -> Result<Option<f64>, StoreError> {
    let raw = record.get(idx).unwrap_or_default();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| StoreError::ParseField {
            field: "value",
            value: raw.to_string(),
            row,
        })
}
