//! Driver configuration: where streams live and how to process them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PipelineConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Alias -> CSV file name inside `data_dir`.
    pub files: BTreeMap<String, String>,
    pub pipeline: PipelineConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        let files = [
            ("lux", "lux.csv"),
            ("humidity", "hum.csv"),
            ("wtemp", "wtemp.csv"),
            ("temperature", "temp.csv"),
            ("pressure", "pressure.csv"),
            ("ec", "ec.csv"),
            ("ph", "ph.csv"),
        ]
        .into_iter()
        .map(|(alias, file)| (alias.to_string(), file.to_string()))
        .collect();

        Self {
            data_dir: PathBuf::from("datasets/ambient_measurements/2022"),
            output_dir: PathBuf::from("datasets/ambient_measurements/2022"),
            files,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn output_path(&self, alias: &str) -> PathBuf {
        self.output_dir.join(format!("{alias}_preprocessed.csv"))
    }

    pub fn joined_output_path(&self) -> PathBuf {
        self.output_dir.join("joined.csv")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads a JSON driver config; absent fields take their defaults.
pub fn load_driver_config(path: &Path) -> Result<DriverConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
