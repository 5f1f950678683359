//! Inference Engine - ONNX Runtime Integration
//!
//! Wraps a loaded model behind the `InferenceEngine` trait so the classifier
//! does not care which runtime executes the forward pass.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array4;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;

use super::loader::ModelSource;
use super::metadata::ModelMetadata;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    /// The frame could not be turned into an input tensor
    #[error("preprocess failed: {0}")]
    Preprocess(String),
    /// The runtime rejected the input or failed mid-run
    #[error("model failure: {0}")]
    ModelFailure(String),
}

// ============================================================================
// INFERENCE ENGINE TRAIT
// ============================================================================

/// Trait for inference engines (ONNX, precompiled ORT, fakes in tests)
pub trait InferenceEngine: Send + Sync {
    /// Run one forward pass over an NCHW `[1, 3, H, W]` input, returning the
    /// raw values of the output tensor.
    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, InferenceError>;

    /// Human readable runtime name
    fn runtime(&self) -> &str;
}

/// Turns a model file into an engine. Errors are reported as plain text and
/// wrapped into `LoadError::ParseFailure` by the loader.
pub trait ModelBackend: Send + Sync {
    fn open(&self, path: &Path, metadata: &ModelMetadata) -> Result<Box<dyn InferenceEngine>, String>;
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

pub struct OnnxEngine {
    session: Mutex<Session>,
    output_name: Option<String>,
}

impl OnnxEngine {
    /// Load an ONNX (or precompiled ORT) model from file
    pub fn from_file(path: &Path, output_name: Option<String>) -> Result<Self, String> {
        log::info!("Loading ONNX model from: {}", path.display());

        let session = Session::builder()
            .map_err(|e| format!("Failed to create session builder: {}", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| format!("Failed to set optimization: {}", e))?
            .commit_from_file(path)
            .map_err(|e| format!("Failed to load model: {}", e))?;

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        // Session::run needs &mut, overlapping inferences serialize here
        let mut session = self.session.lock();

        let output_name = match &self.output_name {
            Some(name) => name.clone(),
            None => session.outputs.first()
                .map(|o| o.name.clone())
                .ok_or_else(|| InferenceError::ModelFailure("No output defined".to_string()))?,
        };

        let input_tensor = Value::from_array(input)
            .map_err(|e| InferenceError::Preprocess(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::ModelFailure(format!("Inference failed: {}", e)))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| InferenceError::ModelFailure(format!("No output named {}", output_name)))?;

        let output_tensor = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::ModelFailure(format!("Extract error: {}", e)))?;

        Ok(output_tensor.1.to_vec())
    }

    fn runtime(&self) -> &str {
        "ONNX Runtime (CPU)"
    }
}

/// Production backend: every model file goes through ONNX Runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct OnnxBackend;

impl ModelBackend for OnnxBackend {
    fn open(&self, path: &Path, metadata: &ModelMetadata) -> Result<Box<dyn InferenceEngine>, String> {
        let engine = OnnxEngine::from_file(path, metadata.output_name.clone())?;
        Ok(Box::new(engine))
    }
}

// ============================================================================
// MODEL HANDLE
// ============================================================================

/// Where and when a model was loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub path: PathBuf,
    pub source: ModelSource,
    /// SHA-256 of the model file, hex encoded
    pub digest: String,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

struct LoadedModel {
    engine: Box<dyn InferenceEngine>,
    metadata: ModelMetadata,
    info: ModelInfo,
}

/// Shared, read-only reference to a loaded model.
///
/// Cloning is cheap; all clones point at the same engine.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<LoadedModel>,
}

impl ModelHandle {
    pub fn new(engine: Box<dyn InferenceEngine>, metadata: ModelMetadata, info: ModelInfo) -> Self {
        Self {
            inner: Arc::new(LoadedModel { engine, metadata, info }),
        }
    }

    pub fn engine(&self) -> &dyn InferenceEngine {
        self.inner.engine.as_ref()
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.inner.metadata
    }

    pub fn info(&self) -> &ModelInfo {
        &self.inner.info
    }

    /// True when both handles refer to the same loaded model
    pub fn same_model(a: &ModelHandle, b: &ModelHandle) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("path", &self.inner.info.path)
            .field("source", &self.inner.info.source)
            .field("runtime", &self.inner.engine.runtime())
            .field("labels", &self.inner.metadata.labels.len())
            .finish()
    }
}
