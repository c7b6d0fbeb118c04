//! Ambient sensor alignment crate.
//!
//! Current implemented scope:
//! - gap filling and resampling of irregular single-variable streams
//! - sampling-rate reconciliation and window-size validation
//! - cyclic hour/day-of-year encoding
//! - multi-scale trailing rolling statistics
//! - joining per-stream feature tables on a shared time index
//! - CSV stream loading and table export for the `build_dataset` driver

mod config;
mod cyclic;
mod error;
mod features;
mod interpolate;
mod join;
mod observability;
mod period;
mod pipeline;
mod reconcile;
mod resample;
mod series;
mod store;
mod table;
mod windows;

pub use config::{load_driver_config, ConfigError, DriverConfig};
pub use cyclic::{
    encode_time, encode_timestamp, CyclicEncoding, CYCLIC_COLUMNS, DAY_OF_YEAR_COS,
    DAY_OF_YEAR_SIN, HOUR_COS, HOUR_SIN,
};
pub use error::{ErrorKind, FeatureError};
pub use features::{
    add_rolling_features, feature_column_name, planned_columns, rolling_statistics, ColumnNaming,
    RollingSpec, Statistic, VarianceForm, Warmup, DEFAULT_STATISTICS,
};
pub use interpolate::{fill_interior, InterpolationMethod};
pub use join::{join_tables, JoinPolicy};
pub use observability::{
    init_logging, log_run_start, log_run_summary, logging_config_from_env,
    logging_config_from_lookup, LogFormat, LoggingConfig, LoggingInitError, LOG_FORMAT_VAR,
    LOG_LEVEL_VAR, LOG_TARGET_VAR,
};
pub use period::{parse_period, parse_periods, Period};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineOutput, ResolvedPipeline};
pub use reconcile::{reconcile_sampling, AliasSampling, SamplingEstimator, SamplingFloor};
pub use resample::{interpolate_and_resample, ResampleConfig, ResampleReport};
pub use series::{Series, StreamSet};
pub use store::{parse_timestamp, read_series_csv, read_stream_set, write_table_csv, StoreError};
pub use table::{FeatureColumn, FeatureTable};
pub use windows::{validate_window_sizes, validate_windows};
