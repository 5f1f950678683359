//! Model Module - loading and running the diagnosis model
//!
//! - `metadata` - label vocabulary and output contract (sidecar JSON)
//! - `inference` - `InferenceEngine` trait, ONNX Runtime engine, `ModelHandle`
//! - `loader` - ordered fallback search with a cached handle

pub mod inference;
pub mod loader;
pub mod metadata;

#[cfg(test)]
mod tests;

// Re-export common types
pub use inference::{InferenceEngine, InferenceError, ModelBackend, ModelHandle, ModelInfo, OnnxBackend};
pub use loader::{LoadError, ModelLoader, ModelResolver, ModelSource, Resolution};
pub use metadata::{ModelMetadata, ScoreNormalization, UNKNOWN_CLASS_LABEL};
