//! Shared logging configuration and initialization.

use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::pipeline::PipelineOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub const LOG_LEVEL_VAR: &str = "AMBIENT_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "AMBIENT_LOG_FORMAT";
pub const LOG_TARGET_VAR: &str = "AMBIENT_LOG_TARGET";

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(()),
        }
    }
}

pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from_lookup(|key| env::var(key).ok())
}

/// Builds the logging config from `lookup(var)`. Blank or unparseable
/// values keep the default for that field.
pub fn logging_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let defaults = LoggingConfig::default();
    let level = lookup(LOG_LEVEL_VAR)
        .map(|raw| raw.trim().to_string())
        .filter(|level| !level.is_empty())
        .unwrap_or(defaults.level);
    let format = lookup(LOG_FORMAT_VAR)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(defaults.format);
    let include_target = lookup(LOG_TARGET_VAR)
        .and_then(|raw| parse_switch(&raw))
        .unwrap_or(defaults.include_target);

    LoggingConfig {
        level,
        format,
        include_target,
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target)
        .with_ansi(matches!(config.format, LogFormat::Pretty));

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_run_start(config: &LoggingConfig, config_source: &str) {
    info!(
        component = "build_dataset",
        event = "app.start",
        log_level = %config.level,
        log_format = ?config.format,
        include_target = config.include_target,
        config_source
    );
}

pub fn log_run_summary(output: &PipelineOutput) {
    info!(
        component = "build_dataset",
        event = "app.summary",
        floor_seconds = output.floor.floor_seconds,
        windows = ?output.windows.iter().map(ToString::to_string).collect::<Vec<_>>(),
        tables = output.tables.len(),
        failed_aliases = ?output.failures.keys().collect::<Vec<_>>()
    );
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
