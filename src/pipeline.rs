//! End-to-end alignment: reconcile, validate windows, resample, encode,
//! synthesize rolling features and optionally join.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cyclic::encode_time;
use crate::error::FeatureError;
use crate::features::{
    add_rolling_features, ColumnNaming, RollingSpec, Statistic, VarianceForm, Warmup,
};
use crate::join::{join_tables, JoinPolicy};
use crate::period::{parse_periods, Period};
use crate::reconcile::{reconcile_sampling, SamplingEstimator, SamplingFloor};
use crate::resample::{interpolate_and_resample, ResampleConfig, ResampleReport};
use crate::series::{Series, StreamSet};
use crate::table::FeatureTable;
use crate::windows::validate_windows;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub resample_frequency: String,
    pub interpolation_method: String,
    pub interpolation_order: Option<u32>,
    pub candidate_windows: Vec<String>,
    pub statistics: Vec<String>,
    pub naming: ColumnNaming,
    pub warmup: Warmup,
    pub variance: VarianceForm,
    pub estimator: SamplingEstimator,
    /// Raise candidate windows to the sampling floor before use.
    pub validate_windows: bool,
    pub encode_time: bool,
    pub join: Option<JoinPolicy>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resample_frequency: "10min".to_string(),
            interpolation_method: "spline".to_string(),
            interpolation_order: Some(3),
            candidate_windows: ["30min", "1d", "2d", "3d", "7d"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
            statistics: crate::features::DEFAULT_STATISTICS
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            naming: ColumnNaming::default(),
            warmup: Warmup::default(),
            variance: VarianceForm::default(),
            estimator: SamplingEstimator::default(),
            validate_windows: true,
            encode_time: true,
            join: None,
        }
    }
}

/// Parsed form of [`PipelineConfig`]; building it is where every
/// configuration error surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPipeline {
    pub resample: ResampleConfig,
    pub candidate_windows: Vec<Period>,
    pub statistics: Vec<Statistic>,
}

impl PipelineConfig {
    pub fn resolve(&self) -> Result<ResolvedPipeline, FeatureError> {
        let resample = ResampleConfig::parse(
            &self.resample_frequency,
            &self.interpolation_method,
            self.interpolation_order,
        )?;
        if self.candidate_windows.is_empty() {
            return Err(FeatureError::EmptyWindowList);
        }
        let candidate_windows = parse_periods(&self.candidate_windows)?;
        if self.statistics.is_empty() {
            return Err(FeatureError::EmptyStatisticList);
        }
        let statistics = self
            .statistics
            .iter()
            .map(|raw| Statistic::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedPipeline {
            resample,
            candidate_windows,
            statistics,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub floor: SamplingFloor,
    /// Windows actually used, ascending.
    pub windows: Vec<Period>,
    pub tables: BTreeMap<String, FeatureTable>,
    pub reports: BTreeMap<String, ResampleReport>,
    pub failures: BTreeMap<String, FeatureError>,
    pub joined: Option<Result<FeatureTable, FeatureError>>,
}

pub fn run_pipeline(
    streams: &StreamSet,
    cfg: &PipelineConfig,
) -> Result<PipelineOutput, FeatureError> {
    let resolved = cfg.resolve()?;
    if streams.is_empty() {
        return Err(FeatureError::EmptyStreamSet);
    }

    info!(
        component = "pipeline",
        event = "pipeline.start",
        aliases = streams.len(),
        frequency = %resolved.resample.frequency,
        method = %resolved.resample.method,
        validate_windows = cfg.validate_windows,
        join = ?cfg.join
    );

    let mut failures = BTreeMap::new();
    let mut eligible = StreamSet::new();
    for (alias, series) in streams {
        if series.len() < 2 {
            let err = FeatureError::InsufficientData {
                alias: alias.clone(),
                found: series.len(),
                required: 2,
            };
            log_alias_failure(alias, &err);
            failures.insert(alias.clone(), err);
        } else {
            eligible.insert(alias.clone(), series.clone());
        }
    }
    if eligible.is_empty() {
        return Err(failures
            .into_values()
            .next()
            .unwrap_or(FeatureError::EmptyStreamSet));
    }

    let floor = reconcile_sampling(&eligible, cfg.estimator)?;
    let window_set: BTreeSet<Period> = if cfg.validate_windows {
        validate_windows(floor.floor_seconds, &resolved.candidate_windows)
    } else {
        resolved.candidate_windows.iter().copied().collect()
    };
    let windows: Vec<Period> = window_set.into_iter().collect();

    info!(
        component = "pipeline",
        event = "pipeline.windows",
        floor_seconds = floor.floor_seconds,
        windows = ?windows.iter().map(ToString::to_string).collect::<Vec<_>>()
    );

    let mut cores = BTreeMap::new();
    let mut reports = BTreeMap::new();
    for (alias, series) in &eligible {
        match build_alias_table(alias, series, &resolved, &windows, cfg) {
            Ok((table, report)) => {
                info!(
                    component = "pipeline",
                    event = "pipeline.alias.finish",
                    alias = %alias,
                    rows = table.len(),
                    column_count = table.columns().len()
                );
                cores.insert(alias.clone(), table);
                reports.insert(alias.clone(), report);
            }
            Err(err) => {
                log_alias_failure(alias, &err);
                failures.insert(alias.clone(), err);
            }
        }
    }

    let joined = cfg.join.map(|policy| {
        let inputs: Vec<FeatureTable> = cores.values().cloned().collect();
        let joined = join_tables(&inputs, policy)?;
        if cfg.encode_time {
            encode_time(&joined)
        } else {
            Ok(joined)
        }
    });

    let mut tables = BTreeMap::new();
    for (alias, core) in cores {
        if cfg.encode_time {
            match encode_time(&core) {
                Ok(table) => {
                    tables.insert(alias, table);
                }
                Err(err) => {
                    log_alias_failure(&alias, &err);
                    failures.insert(alias, err);
                }
            }
        } else {
            tables.insert(alias, core);
        }
    }

    info!(
        component = "pipeline",
        event = "pipeline.finish",
        tables = tables.len(),
        failures = failures.len(),
        joined = ?joined.as_ref().map(|r| r.is_ok())
    );

    Ok(PipelineOutput {
        floor,
        windows,
        tables,
        reports,
        failures,
        joined,
    })
}

/// Resample -> table -> rolling features for one alias. The table starts
/// with only the alias's value column.
fn build_alias_table(
    alias: &str,
    series: &Series,
    resolved: &ResolvedPipeline,
    windows: &[Period],
    cfg: &PipelineConfig,
) -> Result<(FeatureTable, ResampleReport), FeatureError> {
    let (resampled, report) = interpolate_and_resample(series, &resolved.resample)?;
    let (_, index, values) = resampled.into_parts();

    let mut table = FeatureTable::new(index, Some(resolved.resample.step_ms()));
    table.add_column(alias, values)?;

    let spec = RollingSpec {
        variables: vec![alias.to_string()],
        windows: windows.to_vec(),
        statistics: resolved.statistics.clone(),
        naming: cfg.naming,
        warmup: cfg.warmup,
        variance: cfg.variance,
    };
    let table = add_rolling_features(&table, &spec)?;
    Ok((table, report))
}

fn log_alias_failure(alias: &str, err: &FeatureError) {
    warn!(
        component = "pipeline",
        event = "pipeline.alias.failed",
        alias = %alias,
        kind = ?err.kind(),
        error = %err
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 60_000;
    const T0: i64 = 1_646_092_800_000;

    fn ramp(name: &str, step_min: i64, points: i64) -> Series {
        Series::from_points(
            name,
            (0..points).map(|i| (T0 + i * step_min * MIN, i as f64)),
        )
        .unwrap()
    }

    #[test]
    fn config_errors_fail_before_streams_are_touched() {
        let cfg = PipelineConfig {
            statistics: vec!["mean".to_string(), "skew".to_string()],
            ..PipelineConfig::default()
        };
        assert_eq!(
            run_pipeline(&StreamSet::new(), &cfg).unwrap_err(),
            FeatureError::UnknownStatistic("skew".to_string())
        );

        let cfg = PipelineConfig {
            candidate_windows: Vec::new(),
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.resolve().unwrap_err(), FeatureError::EmptyWindowList);

        let cfg = PipelineConfig {
            interpolation_method: "akima".to_string(),
            ..PipelineConfig::default()
        };
        assert!(cfg.resolve().unwrap_err().is_configuration());
    }

    #[test]
    fn short_alias_is_reported_without_aborting_others() {
        let mut streams = StreamSet::new();
        streams.insert("lux".to_string(), ramp("lux", 1, 30));
        streams.insert("ph".to_string(), ramp("ph", 1, 1));
        let cfg = PipelineConfig {
            resample_frequency: "1min".to_string(),
            candidate_windows: vec!["5min".to_string()],
            statistics: vec!["mean".to_string()],
            encode_time: false,
            ..PipelineConfig::default()
        };

        let out = run_pipeline(&streams, &cfg).unwrap();
        assert!(out.tables.contains_key("lux"));
        assert!(matches!(
            out.failures.get("ph"),
            Some(FeatureError::InsufficientData { found: 1, .. })
        ));
    }

    #[test]
    fn validation_can_be_opted_out() {
        let mut streams = StreamSet::new();
        streams.insert("ec".to_string(), ramp("ec", 5, 30));
        let base = PipelineConfig {
            resample_frequency: "5min".to_string(),
            candidate_windows: vec!["1min".to_string(), "10min".to_string()],
            statistics: vec!["mean".to_string()],
            ..PipelineConfig::default()
        };

        let validated = run_pipeline(&streams, &base).unwrap();
        let labels: Vec<String> = validated.windows.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["5min", "10min"]);

        let raw = PipelineConfig {
            validate_windows: false,
            ..base
        };
        let unvalidated = run_pipeline(&streams, &raw).unwrap();
        let labels: Vec<String> = unvalidated.windows.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["1min", "10min"]);
    }

    #[test]
    fn per_alias_columns_do_not_leak_between_aliases() {
        let mut streams = StreamSet::new();
        streams.insert("hum".to_string(), ramp("hum", 1, 20));
        streams.insert("temp".to_string(), ramp("temp", 1, 20));
        let cfg = PipelineConfig {
            resample_frequency: "1min".to_string(),
            candidate_windows: vec!["2min".to_string()],
            statistics: vec!["max".to_string()],
            encode_time: false,
            ..PipelineConfig::default()
        };

        let out = run_pipeline(&streams, &cfg).unwrap();
        assert_eq!(out.tables["hum"].column_names(), vec!["hum", "hum_2min_max"]);
        assert_eq!(out.tables["temp"].column_names(), vec!["temp", "temp_2min_max"]);
    }
}
