//! Sine/cosine encodings of hour-of-day and day-of-year.

use std::f64::consts::PI;

use chrono::{Datelike, TimeZone, Timelike, Utc};

use crate::error::FeatureError;
use crate::table::FeatureTable;

pub const HOUR_SIN: &str = "hour_sin";
pub const HOUR_COS: &str = "hour_cos";
pub const DAY_OF_YEAR_SIN: &str = "day_of_year_sin";
pub const DAY_OF_YEAR_COS: &str = "day_of_year_cos";

pub const CYCLIC_COLUMNS: [&str; 4] = [HOUR_SIN, HOUR_COS, DAY_OF_YEAR_SIN, DAY_OF_YEAR_COS];

// Hours span 0..=23 and days 1..=365 (366 in leap years is not wrapped).
const HOUR_PERIOD: f64 = 23.0;
const DAY_OF_YEAR_PERIOD: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclicEncoding {
    pub hour_sin: f64,
    pub hour_cos: f64,
    pub day_of_year_sin: f64,
    pub day_of_year_cos: f64,
}

pub fn encode_timestamp(ts_ms_utc: i64) -> Result<CyclicEncoding, FeatureError> {
    let dt = Utc
        .timestamp_millis_opt(ts_ms_utc)
        .single()
        .ok_or(FeatureError::InvalidTimestamp(ts_ms_utc))?;
    let hour_angle = 2.0 * PI * f64::from(dt.hour()) / HOUR_PERIOD;
    let day_angle = 2.0 * PI * f64::from(dt.ordinal()) / DAY_OF_YEAR_PERIOD;
    Ok(CyclicEncoding {
        hour_sin: hour_angle.sin(),
        hour_cos: hour_angle.cos(),
        day_of_year_sin: day_angle.sin(),
        day_of_year_cos: day_angle.cos(),
    })
}

/// Returns a copy of `table` with the four cyclic columns appended.
pub fn encode_time(table: &FeatureTable) -> Result<FeatureTable, FeatureError> {
    let mut columns: [Vec<Option<f64>>; 4] = Default::default();
    for ts in table.index() {
        let enc = encode_timestamp(*ts)?;
        columns[0].push(Some(enc.hour_sin));
        columns[1].push(Some(enc.hour_cos));
        columns[2].push(Some(enc.day_of_year_sin));
        columns[3].push(Some(enc.day_of_year_cos));
    }

    let mut out = table.clone();
    for (name, values) in CYCLIC_COLUMNS.into_iter().zip(columns) {
        out.add_column(name, values)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 3_600_000;
    // 2022-01-01T00:00:00Z
    const T0: i64 = 1_640_995_200_000;

    #[test]
    fn encodings_are_bounded_over_a_year() {
        for step in 0..(366 * 24) {
            let enc = encode_timestamp(T0 + step * HOUR_MS).unwrap();
            for v in [
                enc.hour_sin,
                enc.hour_cos,
                enc.day_of_year_sin,
                enc.day_of_year_cos,
            ] {
                assert!((-1.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn hour_wraps_close_to_midnight() {
        let late = encode_timestamp(T0 + 23 * HOUR_MS).unwrap();
        let midnight = encode_timestamp(T0 + 24 * HOUR_MS).unwrap();
        let neighbour = encode_timestamp(T0 + 25 * HOUR_MS).unwrap();

        // Period 23 maps hour 23 onto hour 0 exactly.
        assert!((late.hour_sin - midnight.hour_sin).abs() < 1e-12);
        assert!((late.hour_cos - midnight.hour_cos).abs() < 1e-12);

        let step = 2.0 * PI / 23.0;
        let d_wrap = (midnight.hour_sin - late.hour_sin).abs();
        let d_next = (neighbour.hour_sin - midnight.hour_sin).abs();
        assert!(d_wrap <= step);
        assert!(d_next <= step);
    }

    #[test]
    fn encode_time_appends_columns_without_touching_input() {
        let mut table = FeatureTable::new(vec![T0, T0 + HOUR_MS], Some(HOUR_MS));
        table.add_column("lux", vec![Some(1.0), Some(2.0)]).unwrap();
        let before = table.clone();

        let encoded = encode_time(&table).unwrap();
        assert_eq!(table, before);
        assert_eq!(
            encoded.column_names(),
            vec!["lux", HOUR_SIN, HOUR_COS, DAY_OF_YEAR_SIN, DAY_OF_YEAR_COS]
        );
        let doy = encoded.column(DAY_OF_YEAR_SIN).unwrap()[0].unwrap();
        assert!((doy - (2.0 * PI / 365.0).sin()).abs() < 1e-12);
    }

    #[test]
    fn encoding_twice_collides() {
        let table = FeatureTable::new(vec![T0], Some(HOUR_MS));
        let once = encode_time(&table).unwrap();
        assert_eq!(
            encode_time(&once).unwrap_err(),
            FeatureError::DuplicateColumn(HOUR_SIN.to_string())
        );
    }
}
