//! Diagnosis Configuration
//!
//! Model search locations, gating and publishing knobs.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants;

/// Where the model loader looks, in order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelLocations {
    /// Packaged resource directory (primary + precompiled formats)
    pub bundle_dir: PathBuf,
    /// Installation root (`<install_dir>/models/<model>`)
    pub install_dir: PathBuf,
    /// Writable directory holding the copied model
    pub data_dir: PathBuf,
    /// Seed copied into `data_dir` on first use
    pub model_seed: Option<PathBuf>,
    /// Model base name without extension
    pub model_name: String,
}

/// Same locations as the environment path, so a partial config file
/// only overrides what it names
impl Default for ModelLocations {
    fn default() -> Self {
        Self {
            bundle_dir: constants::get_bundle_dir(),
            install_dir: constants::get_install_dir(),
            data_dir: constants::get_data_dir(),
            model_seed: constants::get_model_seed(),
            model_name: constants::MODEL_BASE_NAME.to_string(),
        }
    }
}

/// Top-level configuration of the capture-to-inference pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosisConfig {
    pub models: ModelLocations,

    /// Minimum seconds between admitted frames
    pub gate_interval_secs: f64,

    /// Confidence threshold for publishing a real label
    pub confidence_threshold: f32,

    /// False on hosts without a physical camera (simulators)
    pub live_inference_available: bool,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            models: ModelLocations::default(),
            gate_interval_secs: constants::DEFAULT_GATE_INTERVAL_SECS,
            confidence_threshold: constants::DEFAULT_CONFIDENCE_THRESHOLD,
            live_inference_available: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl DiagnosisConfig {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            models: ModelLocations::default(),
            gate_interval_secs: constants::get_gate_interval(),
            confidence_threshold: constants::get_confidence_threshold(),
            live_inference_available: constants::is_live_inference_available(),
        }
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        log::info!("Diagnosis config loaded from: {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !self.gate_interval_secs.is_finite() || self.gate_interval_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gate_interval_secs must be a non-negative number, got {}",
                self.gate_interval_secs
            )));
        }
        if self.models.model_name.trim().is_empty() {
            return Err(ConfigError::Invalid("model_name is empty".to_string()));
        }
        Ok(())
    }
}
