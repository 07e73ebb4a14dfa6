//! Runtime defaults shared by model construction, solving, and deletion analysis
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration values, passed explicitly to the parts of the crate that need them
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Default flux magnitude bound for reactions without an explicit constraint
    pub vmax: String,
    /// Fraction of the wild type objective below which a deletion is lethal
    pub lethal_fraction: f64,
    /// Wall clock limit for a single solver invocation, in seconds
    pub solver_timeout_secs: u64,
    /// Number of worker threads used by deletion analyses
    pub processes: usize,
    /// Path (or name on the PATH) of the glpsol executable
    pub glpsol_path: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            vmax: "1000".to_string(),
            lethal_fraction: 0.25,
            solver_timeout_secs: 50,
            processes: 1,
            glpsol_path: PathBuf::from("glpsol"),
        }
    }
}

impl Configuration {
    /// Read a configuration from a JSON file, any missing field takes its default value
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Configuration, ConfigurationError> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json_str(data: &str) -> Result<Configuration, ConfigurationError> {
        let configuration: Configuration = serde_json::from_str(data)?;
        if configuration.processes == 0 {
            return Err(ConfigurationError::InvalidValue(
                "processes must be at least 1".to_string(),
            ));
        }
        Ok(configuration)
    }

    /// Solver timeout as a [`Duration`]
    pub fn solver_timeout(&self) -> Duration {
        Duration::from_secs(self.solver_timeout_secs)
    }
}

/// Errors encountered while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Unable to read configuration file: {0}")]
    UnableToRead(#[from] std::io::Error),
    #[error("Unable to parse configuration: {0}")]
    UnableToParse(#[from] serde_json::Error),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
