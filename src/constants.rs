//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every value can be overridden through the environment with the `get_*` helpers.

use std::path::PathBuf;

/// Base file name of the diagnosis model (without extension)
pub const MODEL_BASE_NAME: &str = "plantdoc_resnet18";

/// Primary packaged model format
pub const MODEL_PRIMARY_EXT: &str = "onnx";

/// Precompiled fallback format (ONNX Runtime optimized model)
pub const MODEL_PRECOMPILED_EXT: &str = "ort";

/// Square input edge expected by the model (pixels)
pub const MODEL_INPUT_SIZE: u32 = 224;

/// Minimum spacing between two admitted inferences (seconds of the host clock)
pub const DEFAULT_GATE_INTERVAL_SECS: f64 = 2.0;

/// Confidence below which the "unrecognized" sentinel is published
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// Directory name used under the platform data dir
pub const DATA_DIR_NAME: &str = "PlantDoc";

/// Sub-directory holding the writable model copy
pub const MODELS_DIR_NAME: &str = "models";

/// Installation-relative model directory
pub const INSTALL_MODELS_DIR: &str = "models";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "PlantDoc";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Packaged resource directory (next to the executable unless overridden)
pub fn get_bundle_dir() -> PathBuf {
    std::env::var("PLANTDOC_BUNDLE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.join("resources")))
                .unwrap_or_else(|| PathBuf::from("resources"))
        })
}

/// Installation root, searched as `<install>/models/<model>`
pub fn get_install_dir() -> PathBuf {
    std::env::var("PLANTDOC_INSTALL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Writable data directory for the copied model
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PLANTDOC_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_local_dir()
        .map(|d| d.join(DATA_DIR_NAME).join(MODELS_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("data").join(MODELS_DIR_NAME))
}

/// Seed file copied into the data directory when nothing else is found
pub fn get_model_seed() -> Option<PathBuf> {
    std::env::var("PLANTDOC_MODEL_SEED")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Get confidence threshold from environment or use default
pub fn get_confidence_threshold() -> f32 {
    std::env::var("PLANTDOC_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|t: &f32| (0.0..=1.0).contains(t))
        .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD)
}

/// Get gate interval from environment or use default
pub fn get_gate_interval() -> f64 {
    std::env::var("PLANTDOC_GATE_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|v: &f64| *v >= 0.0)
        .unwrap_or(DEFAULT_GATE_INTERVAL_SECS)
}

/// Check if live inference is structurally available (physical camera present)
pub fn is_live_inference_available() -> bool {
    std::env::var("PLANTDOC_LIVE_INFERENCE")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}
