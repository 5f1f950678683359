//! Model Metadata - label vocabulary and output contract
//!
//! Read from a `<model file>.json` sidecar when one ships with the model.
//! Without a sidecar the built-in vocabulary and score scaling are used.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants::MODEL_INPUT_SIZE;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Label used when the arg-max index falls outside the vocabulary
pub const UNKNOWN_CLASS_LABEL: &str = "unknown class";

/// Built-in vocabulary used when the model ships without a sidecar
pub const DEFAULT_LABELS: [&str; 10] = [
    "healthy plant",
    "diseased plant",
    "leaf spot",
    "root rot",
    "stem disease",
    "flower disease",
    "fruit disease",
    "seed disease",
    "bud disease",
    "branch disease",
];

/// Divisor applied to raw scores when no sidecar says otherwise
pub const DEFAULT_SCORE_DIVISOR: f32 = 100.0;

// ============================================================================
// SCORE NORMALIZATION
// ============================================================================

/// How raw output values become confidences in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScoreNormalization {
    /// Outputs already are probabilities
    None,
    /// Outputs are logits
    Softmax,
    /// Outputs are divided by a fixed constant
    Scale { divisor: f32 },
}

impl Default for ScoreNormalization {
    fn default() -> Self {
        ScoreNormalization::Scale { divisor: DEFAULT_SCORE_DIVISOR }
    }
}

impl ScoreNormalization {
    /// Map raw outputs to confidences, clamped into [0, 1]. NaN maps to 0.
    pub fn apply(&self, raw: &[f32]) -> Vec<f32> {
        let scores: Vec<f32> = match self {
            ScoreNormalization::None => raw.to_vec(),
            ScoreNormalization::Scale { divisor } => {
                let divisor = if divisor.abs() > f32::EPSILON { *divisor } else { 1.0 };
                raw.iter().map(|v| v / divisor).collect()
            }
            ScoreNormalization::Softmax => softmax(raw),
        };

        scores
            .into_iter()
            .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
            .collect()
    }
}

fn softmax(raw: &[f32]) -> Vec<f32> {
    let max = raw
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; raw.len()];
    }

    let exps: Vec<f32> = raw.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; raw.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

// ============================================================================
// METADATA
// ============================================================================

/// Output contract of a classification model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    pub input_size: u32,
    pub score_normalization: ScoreNormalization,
    /// Per-channel mean subtracted after scaling pixels to [0, 1]
    pub mean: Option<[f32; 3]>,
    /// Per-channel std divided after mean subtraction
    pub std: Option<[f32; 3]>,
    /// Output tensor to read; first output when absent
    pub output_name: Option<String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            input_size: MODEL_INPUT_SIZE,
            score_normalization: ScoreNormalization::default(),
            mean: None,
            std: None,
            output_name: None,
        }
    }
}

impl ModelMetadata {
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Label for an output index
    pub fn label(&self, index: usize) -> &str {
        self.labels
            .get(index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CLASS_LABEL)
    }

    /// Sidecar path for a model file: `<model file>.json`
    pub fn sidecar_path(model_path: &Path) -> PathBuf {
        let mut name = model_path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }

    /// Load the sidecar next to `model_path`, or defaults if there is none.
    /// A broken sidecar is logged and ignored.
    pub fn load_for(model_path: &Path) -> Self {
        let sidecar = Self::sidecar_path(model_path);
        if !sidecar.exists() {
            log::debug!("No metadata sidecar for {}, using defaults", model_path.display());
            return Self::default();
        }

        let parsed = std::fs::read_to_string(&sidecar)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<Self>(&content).map_err(|e| e.to_string()));

        match parsed {
            Ok(metadata) if metadata.input_size > 0 => {
                log::info!(
                    "Model metadata loaded from: {} ({} labels)",
                    sidecar.display(),
                    metadata.labels.len()
                );
                metadata
            }
            Ok(_) => {
                log::warn!("Ignoring metadata {}: input_size must be positive", sidecar.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring unreadable metadata {}: {}", sidecar.display(), e);
                Self::default()
            }
        }
    }
}
