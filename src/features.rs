//! Multi-scale trailing-window statistics over feature tables.
//!
//! Windows are anchored on time, not row counts: the statistic at `t`
//! covers every observation with timestamp in `(t - window, t]`.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::FeatureError;
use crate::period::{parse_period, Period};
use crate::table::FeatureTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Mean,
    Std,
    Var,
    Max,
    Min,
    Median,
    Sum,
    Count,
}

pub const DEFAULT_STATISTICS: [Statistic; 6] = [
    Statistic::Mean,
    Statistic::Std,
    Statistic::Max,
    Statistic::Min,
    Statistic::Median,
    Statistic::Sum,
];

impl Statistic {
    pub fn parse(input: &str) -> Result<Self, FeatureError> {
        match input.trim() {
            "mean" => Ok(Self::Mean),
            "std" => Ok(Self::Std),
            "var" => Ok(Self::Var),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            "median" => Ok(Self::Median),
            "sum" => Ok(Self::Sum),
            "count" => Ok(Self::Count),
            other => Err(FeatureError::UnknownStatistic(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Var => "var",
            Self::Max => "max",
            Self::Min => "min",
            Self::Median => "median",
            Self::Sum => "sum",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColumnNaming {
    /// `{variable}_{window}_{statistic}`
    #[default]
    VariableWindowStatistic,
    /// `{statistic}_{window}`, only unambiguous for a single variable.
    StatisticWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Warmup {
    /// Undefined until the trailing window is covered by history.
    #[default]
    FullWindow,
    /// Defined as soon as the window holds one observation.
    Partial,
}

/// Divisor used by `std` and `var`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VarianceForm {
    /// Divides by `n - 1`; undefined for a single observation.
    #[default]
    Sample,
    /// Divides by `n`.
    Population,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingSpec {
    pub variables: Vec<String>,
    pub windows: Vec<Period>,
    pub statistics: Vec<Statistic>,
    pub naming: ColumnNaming,
    pub warmup: Warmup,
    pub variance: VarianceForm,
}

impl RollingSpec {
    /// Parses window and statistic names; any unknown name fails here, before
    /// a table is touched.
    pub fn parse(
        variables: &[&str],
        windows: &[&str],
        statistics: &[&str],
    ) -> Result<Self, FeatureError> {
        let windows = windows
            .iter()
            .map(|raw| parse_period(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let statistics = statistics
            .iter()
            .map(|raw| Statistic::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            variables: variables.iter().map(|v| v.to_string()).collect(),
            windows,
            statistics,
            naming: ColumnNaming::default(),
            warmup: Warmup::default(),
            variance: VarianceForm::default(),
        })
    }

    pub fn with_naming(mut self, naming: ColumnNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_warmup(mut self, warmup: Warmup) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_variance(mut self, variance: VarianceForm) -> Self {
        self.variance = variance;
        self
    }
}

pub fn feature_column_name(
    naming: ColumnNaming,
    variable: &str,
    window: Period,
    statistic: Statistic,
) -> String {
    match naming {
        ColumnNaming::VariableWindowStatistic => format!("{variable}_{window}_{statistic}"),
        ColumnNaming::StatisticWindow => format!("{statistic}_{window}"),
    }
}

/// Column names `spec` would append, in emission order. Fails on an empty
/// window or statistic list and on names that repeat.
pub fn planned_columns(spec: &RollingSpec) -> Result<Vec<String>, FeatureError> {
    if spec.windows.is_empty() {
        return Err(FeatureError::EmptyWindowList);
    }
    if spec.statistics.is_empty() {
        return Err(FeatureError::EmptyStatisticList);
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for variable in &spec.variables {
        for window in &spec.windows {
            for statistic in &spec.statistics {
                let name = feature_column_name(spec.naming, variable, *window, *statistic);
                if !seen.insert(name.clone()) {
                    return Err(FeatureError::DuplicateColumn(name));
                }
                columns.push(name);
            }
        }
    }
    Ok(columns)
}

/// Returns a copy of `table` with one column per (variable, window,
/// statistic). All names are checked before any column is computed.
pub fn add_rolling_features(
    table: &FeatureTable,
    spec: &RollingSpec,
) -> Result<FeatureTable, FeatureError> {
    let columns = planned_columns(spec)?;
    for variable in &spec.variables {
        if !table.has_column(variable) {
            return Err(FeatureError::UnknownColumn(variable.clone()));
        }
    }
    if let Some(existing) = columns.iter().find(|name| table.has_column(name)) {
        return Err(FeatureError::DuplicateColumn(existing.clone()));
    }
    table.check_regular()?;

    info!(
        component = "features",
        event = "features.rolling.start",
        rows = table.len(),
        variables = ?spec.variables,
        windows = ?spec.windows.iter().map(ToString::to_string).collect::<Vec<_>>(),
        statistics = ?spec.statistics,
        warmup = ?spec.warmup
    );

    let mut computed = Vec::with_capacity(columns.len());
    for variable in &spec.variables {
        let values = table
            .column(variable)
            .ok_or_else(|| FeatureError::UnknownColumn(variable.clone()))?;
        for window in &spec.windows {
            computed.extend(rolling_statistics(
                table.index(),
                values,
                window.millis(),
                &spec.statistics,
                spec.warmup,
                spec.variance,
                table.step_ms(),
            ));
        }
    }

    let mut out = table.clone();
    for (name, values) in columns.into_iter().zip(computed) {
        out.add_column(name, values)?;
    }

    info!(
        component = "features",
        event = "features.rolling.finish",
        rows = out.len(),
        column_count = out.columns().len()
    );

    Ok(out)
}

/// Observations inside `(t - window, t]` plus running sums for the moment
/// statistics. Sums are taken relative to `shift` (the oldest value when the
/// window last started from empty) to limit cancellation.
#[derive(Debug, Clone)]
struct TrailingWindow {
    points: VecDeque<(i64, f64)>,
    window_ms: i64,
    shift: f64,
    sum: f64,
    sum_sq: f64,
}

impl TrailingWindow {
    fn new(window_ms: i64) -> Self {
        Self {
            points: VecDeque::new(),
            window_ms,
            shift: 0.0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    fn advance(&mut self, ts: i64, value: Option<f64>) {
        if let Some(v) = value {
            if self.points.is_empty() {
                self.shift = v;
                self.sum = 0.0;
                self.sum_sq = 0.0;
            }
            let d = v - self.shift;
            self.sum += d;
            self.sum_sq += d * d;
            self.points.push_back((ts, v));
        }
        let cutoff = ts.saturating_sub(self.window_ms);
        while let Some(&(front_ts, front)) = self.points.front() {
            if front_ts > cutoff {
                break;
            }
            let d = front - self.shift;
            self.sum -= d;
            self.sum_sq -= d * d;
            self.points.pop_front();
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|(_, v)| *v)
    }

    fn variance(&self, form: VarianceForm) -> Option<f64> {
        let n = self.len();
        let divisor = match form {
            VarianceForm::Sample if n < 2 => return None,
            VarianceForm::Sample => (n - 1) as f64,
            VarianceForm::Population if n == 0 => return None,
            VarianceForm::Population => n as f64,
        };
        let centered = self.sum_sq - self.sum * self.sum / n as f64;
        Some(centered.max(0.0) / divisor)
    }

    fn statistic(&self, statistic: Statistic, form: VarianceForm) -> Option<f64> {
        let n = self.len();
        if n == 0 {
            return (statistic == Statistic::Count).then_some(0.0);
        }
        match statistic {
            Statistic::Count => Some(n as f64),
            Statistic::Sum => Some(self.shift * n as f64 + self.sum),
            Statistic::Mean => Some(self.shift + self.sum / n as f64),
            Statistic::Var => self.variance(form),
            Statistic::Std => self.variance(form).map(f64::sqrt),
            Statistic::Max => Some(self.values().fold(f64::MIN, f64::max)),
            Statistic::Min => Some(self.values().fold(f64::MAX, f64::min)),
            Statistic::Median => {
                let mut sorted: Vec<f64> = self.values().collect();
                sorted.sort_by(f64::total_cmp);
                let mid = n / 2;
                if n % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

/// One output vector per statistic, aligned with `index`.
pub fn rolling_statistics(
    index: &[i64],
    values: &[Option<f64>],
    window_ms: i64,
    statistics: &[Statistic],
    warmup: Warmup,
    variance: VarianceForm,
    step_ms: Option<i64>,
) -> Vec<Vec<Option<f64>>> {
    let mut out = vec![Vec::with_capacity(index.len()); statistics.len()];
    let Some(first_ts) = index.first().copied() else {
        return out;
    };
    let warm_after = first_ts
        .saturating_add(window_ms)
        .saturating_sub(step_ms.unwrap_or(0));

    let mut window = TrailingWindow::new(window_ms);
    for (ts, value) in index.iter().zip(values) {
        window.advance(*ts, *value);
        let warm = match warmup {
            Warmup::FullWindow => *ts >= warm_after,
            Warmup::Partial => window.len() > 0,
        };
        for (slot, statistic) in out.iter_mut().zip(statistics) {
            slot.push(if warm {
                window.statistic(*statistic, variance)
            } else {
                None
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 60_000;

    fn grid_table(values: &[f64]) -> FeatureTable {
        let index = (0..values.len() as i64).map(|i| i * MIN).collect();
        let mut t = FeatureTable::new(index, Some(MIN));
        t.add_column("temp", values.iter().map(|v| Some(*v)).collect())
            .unwrap();
        t
    }

    fn filled(values: &[f64]) -> TrailingWindow {
        let mut window = TrailingWindow::new(i64::MAX);
        for (i, v) in values.iter().enumerate() {
            window.advance(i as i64, Some(*v));
        }
        window
    }

    #[test]
    fn statistics_match_hand_computed_values() {
        let window = filled(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let sample = VarianceForm::Sample;
        assert_eq!(window.statistic(Statistic::Mean, sample), Some(5.0));
        assert_eq!(window.statistic(Statistic::Var, sample), Some(32.0 / 7.0));
        let std = window.statistic(Statistic::Std, sample).unwrap();
        assert!((std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(window.statistic(Statistic::Median, sample), Some(4.5));
        assert_eq!(window.statistic(Statistic::Sum, sample), Some(40.0));
        assert_eq!(window.statistic(Statistic::Max, sample), Some(9.0));
        assert_eq!(window.statistic(Statistic::Min, sample), Some(2.0));

        let population = VarianceForm::Population;
        assert_eq!(window.statistic(Statistic::Std, population), Some(2.0));
        assert_eq!(window.statistic(Statistic::Var, population), Some(4.0));

        let empty = filled(&[]);
        assert_eq!(empty.statistic(Statistic::Count, sample), Some(0.0));
        assert_eq!(empty.statistic(Statistic::Mean, sample), None);
    }

    #[test]
    fn sample_dispersion_is_undefined_for_one_observation() {
        let out = rolling_statistics(
            &[0, MIN],
            &[Some(1.0), Some(2.0)],
            2 * MIN,
            &[Statistic::Std, Statistic::Var],
            Warmup::Partial,
            VarianceForm::Sample,
            Some(MIN),
        );
        assert_eq!(out[0][0], None);
        assert!((out[0][1].unwrap() - 0.5_f64.sqrt()).abs() < 1e-12);
        assert_eq!(out[1], vec![None, Some(0.5)]);

        let population = rolling_statistics(
            &[0, MIN],
            &[Some(1.0), Some(2.0)],
            2 * MIN,
            &[Statistic::Std, Statistic::Var],
            Warmup::Partial,
            VarianceForm::Population,
            Some(MIN),
        );
        assert_eq!(population[0], vec![Some(0.0), Some(0.5)]);
        assert_eq!(population[1], vec![Some(0.0), Some(0.25)]);
    }

    #[test]
    fn longest_window_stays_in_range_for_recent_timestamps() {
        let longest = Period::from_seconds(i64::MAX as u64 / 1_000).unwrap();
        let t0 = 1_646_092_800_000;
        let out = rolling_statistics(
            &[t0, t0 + MIN],
            &[Some(1.0), Some(3.0)],
            longest.millis(),
            &[Statistic::Mean],
            Warmup::FullWindow,
            VarianceForm::Sample,
            Some(MIN),
        );
        assert_eq!(out[0], vec![None, None]);

        let partial = rolling_statistics(
            &[t0, t0 + MIN],
            &[Some(1.0), Some(3.0)],
            longest.millis(),
            &[Statistic::Mean],
            Warmup::Partial,
            VarianceForm::Sample,
            Some(MIN),
        );
        assert_eq!(partial[0], vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn running_sums_track_evictions_over_long_streams() {
        let index: Vec<i64> = (0..2_000).map(|i| i * MIN).collect();
        let values: Vec<Option<f64>> = (0..2_000)
            .map(|i| (i % 7 != 3).then(|| 20.0 + ((i * 37) % 101) as f64 * 0.1))
            .collect();
        let window_ms = 60 * MIN;
        let out = rolling_statistics(
            &index,
            &values,
            window_ms,
            &[Statistic::Mean, Statistic::Var, Statistic::Sum],
            Warmup::Partial,
            VarianceForm::Sample,
            Some(MIN),
        );

        for row in [59, 500, 1_999] {
            let ts = index[row];
            let inside: Vec<f64> = index
                .iter()
                .zip(&values)
                .filter(|(t, _)| **t > ts - window_ms && **t <= ts)
                .filter_map(|(_, v)| *v)
                .collect();
            let n = inside.len() as f64;
            let mean = inside.iter().sum::<f64>() / n;
            let var = inside.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
            assert!((out[0][row].unwrap() - mean).abs() < 1e-9);
            assert!((out[1][row].unwrap() - var).abs() < 1e-9);
            assert!((out[2][row].unwrap() - mean * n).abs() < 1e-7);
        }
    }

    #[test]
    fn trailing_window_excludes_left_edge_and_warms_up() {
        let table = grid_table(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let spec = RollingSpec::parse(&["temp"], &["3min"], &["sum", "count"]).unwrap();
        let out = add_rolling_features(&table, &spec).unwrap();

        assert_eq!(
            out.column("temp_3min_sum").unwrap(),
            &[None, None, Some(6.0), Some(9.0), Some(12.0)]
        );
        assert_eq!(
            out.column("temp_3min_count").unwrap(),
            &[None, None, Some(3.0), Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn partial_warmup_defines_leading_rows() {
        let table = grid_table(&[1.0, 2.0, 3.0]);
        let spec = RollingSpec::parse(&["temp"], &["10min"], &["mean"])
            .unwrap()
            .with_warmup(Warmup::Partial);
        let out = add_rolling_features(&table, &spec).unwrap();
        assert_eq!(
            out.column("temp_10min_mean").unwrap(),
            &[Some(1.0), Some(1.5), Some(2.0)]
        );
    }

    #[test]
    fn missing_values_are_skipped_inside_the_window() {
        let index = vec![0, MIN, 2 * MIN];
        let mut table = FeatureTable::new(index, Some(MIN));
        table
            .add_column("ph", vec![Some(7.0), None, Some(8.0)])
            .unwrap();
        let spec = RollingSpec::parse(&["ph"], &["2min"], &["mean"]).unwrap();
        let out = add_rolling_features(&table, &spec).unwrap();
        assert_eq!(
            out.column("ph_2min_mean").unwrap(),
            &[None, Some(7.0), Some(8.0)]
        );
    }

    #[test]
    fn later_values_never_leak_backwards() {
        let base = [1.0, 5.0, 2.0, 8.0, 3.0, 9.0];
        let mut perturbed = base;
        perturbed[4] = 1_000.0;

        let spec = RollingSpec::parse(&["temp"], &["2min"], &["mean", "max", "std"]).unwrap();
        let a = add_rolling_features(&grid_table(&base), &spec).unwrap();
        let b = add_rolling_features(&grid_table(&perturbed), &spec).unwrap();
        for name in ["temp_2min_mean", "temp_2min_max", "temp_2min_std"] {
            assert_eq!(a.column(name).unwrap()[..4], b.column(name).unwrap()[..4]);
        }
    }

    #[test]
    fn unknown_statistic_fails_before_any_column() {
        assert_eq!(
            RollingSpec::parse(&["temp"], &["10min"], &["mean", "skew"]).unwrap_err(),
            FeatureError::UnknownStatistic("skew".to_string())
        );
    }

    #[test]
    fn naming_schemes_and_collisions() {
        let spec = RollingSpec::parse(&["lux", "hum"], &["1h"], &["mean"]).unwrap();
        assert_eq!(planned_columns(&spec).unwrap(), vec!["lux_1h_mean", "hum_1h_mean"]);

        let clash = spec.with_naming(ColumnNaming::StatisticWindow);
        assert_eq!(
            planned_columns(&clash).unwrap_err(),
            FeatureError::DuplicateColumn("mean_1h".to_string())
        );
    }

    #[test]
    fn gapped_grid_is_rejected() {
        let mut table = FeatureTable::new(vec![0, MIN, 3 * MIN], Some(MIN));
        table.add_column("temp", vec![Some(1.0); 3]).unwrap();
        let spec = RollingSpec::parse(&["temp"], &["2min"], &["mean"]).unwrap();
        assert!(matches!(
            add_rolling_features(&table, &spec).unwrap_err(),
            FeatureError::GridGap { .. }
        ));
    }

    #[test]
    fn unknown_variable_is_configuration_error() {
        let spec = RollingSpec::parse(&["co2"], &["2min"], &["mean"]).unwrap();
        let err = add_rolling_features(&grid_table(&[1.0]), &spec).unwrap_err();
        assert!(err.is_configuration());
    }
}
