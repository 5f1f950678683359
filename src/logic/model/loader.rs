//! Model Loader - ordered fallback search for the diagnosis model
//!
//! Each location is a `ModelResolver`; the loader walks them in order and the
//! first one whose file also parses wins. The resulting handle is cached, so
//! repeated `load()` calls do not touch the filesystem again.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{INSTALL_MODELS_DIR, MODEL_PRECOMPILED_EXT, MODEL_PRIMARY_EXT};
use crate::logic::config::ModelLocations;
use super::inference::{ModelBackend, ModelHandle, ModelInfo};
use super::metadata::ModelMetadata;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("model not found (searched: {searched:?})")]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to parse model {path:?}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    #[error("failed to copy model {from:?} -> {to:?}: {reason}")]
    CopyFailure { from: PathBuf, to: PathBuf, reason: String },
}

// ============================================================================
// RESOLVERS
// ============================================================================

/// Which step of the search produced the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    BundlePrimary,
    BundlePrecompiled,
    Installation,
    DataCopy,
}

/// Outcome of one resolver
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(PathBuf),
    /// Nothing usable; carries the paths that were checked
    Missing(Vec<PathBuf>),
}

pub trait ModelResolver: Send + Sync {
    fn source(&self) -> ModelSource;
    fn resolve(&self) -> Result<Resolution, LoadError>;
}

/// A single fixed file location
#[derive(Debug, Clone)]
pub struct FileResolver {
    source: ModelSource,
    path: PathBuf,
}

impl FileResolver {
    pub fn new(source: ModelSource, path: impl Into<PathBuf>) -> Self {
        Self { source, path: path.into() }
    }
}

impl ModelResolver for FileResolver {
    fn source(&self) -> ModelSource {
        self.source
    }

    fn resolve(&self) -> Result<Resolution, LoadError> {
        if self.path.is_file() {
            Ok(Resolution::Found(self.path.clone()))
        } else {
            Ok(Resolution::Missing(vec![self.path.clone()]))
        }
    }
}

/// Writable copy of the model, seeded from a known source on first use
#[derive(Debug, Clone)]
pub struct DataCopyResolver {
    target: PathBuf,
    seed: Option<PathBuf>,
}

impl DataCopyResolver {
    pub fn new(data_dir: &Path, file_name: &str, seed: Option<PathBuf>) -> Self {
        Self {
            target: data_dir.join(file_name),
            seed,
        }
    }
}

impl ModelResolver for DataCopyResolver {
    fn source(&self) -> ModelSource {
        ModelSource::DataCopy
    }

    fn resolve(&self) -> Result<Resolution, LoadError> {
        if self.target.is_file() {
            return Ok(Resolution::Found(self.target.clone()));
        }

        let seed = match &self.seed {
            Some(seed) if seed.is_file() => seed,
            Some(seed) => return Ok(Resolution::Missing(vec![self.target.clone(), seed.clone()])),
            None => return Ok(Resolution::Missing(vec![self.target.clone()])),
        };

        let copy_failure = |reason: String| LoadError::CopyFailure {
            from: seed.clone(),
            to: self.target.clone(),
            reason,
        };

        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent).map_err(|e| copy_failure(e.to_string()))?;
        }
        fs::copy(seed, &self.target).map_err(|e| copy_failure(e.to_string()))?;

        let seed_sidecar = ModelMetadata::sidecar_path(seed);
        if seed_sidecar.is_file() {
            if let Err(e) = fs::copy(&seed_sidecar, ModelMetadata::sidecar_path(&self.target)) {
                log::warn!("Model copied but its metadata was not: {}", e);
            }
        }

        log::info!("Model seeded into data directory: {}", self.target.display());
        Ok(Resolution::Found(self.target.clone()))
    }
}

/// Search order: bundle (primary), bundle (precompiled), installation dir,
/// writable copy seeded from `model_seed`.
pub fn default_resolvers(locations: &ModelLocations) -> Vec<Box<dyn ModelResolver>> {
    let primary = format!("{}.{}", locations.model_name, MODEL_PRIMARY_EXT);
    let precompiled = format!("{}.{}", locations.model_name, MODEL_PRECOMPILED_EXT);

    vec![
        Box::new(FileResolver::new(
            ModelSource::BundlePrimary,
            locations.bundle_dir.join(&primary),
        )),
        Box::new(FileResolver::new(
            ModelSource::BundlePrecompiled,
            locations.bundle_dir.join(&precompiled),
        )),
        Box::new(FileResolver::new(
            ModelSource::Installation,
            locations.install_dir.join(INSTALL_MODELS_DIR).join(&primary),
        )),
        Box::new(DataCopyResolver::new(
            &locations.data_dir,
            &primary,
            locations.model_seed.clone(),
        )),
    ]
}

// ============================================================================
// LOADER
// ============================================================================

pub struct ModelLoader {
    resolvers: Vec<Box<dyn ModelResolver>>,
    backend: Box<dyn ModelBackend>,
    cached: Mutex<Option<ModelHandle>>,
}

impl ModelLoader {
    pub fn new(resolvers: Vec<Box<dyn ModelResolver>>, backend: Box<dyn ModelBackend>) -> Self {
        Self {
            resolvers,
            backend,
            cached: Mutex::new(None),
        }
    }

    /// Loader with the default search chain
    pub fn from_locations(locations: &ModelLocations, backend: Box<dyn ModelBackend>) -> Self {
        Self::new(default_resolvers(locations), backend)
    }

    /// Return the cached handle, or search for the model and cache it
    pub fn load(&self) -> Result<ModelHandle, LoadError> {
        let mut cached = self.cached.lock();
        if let Some(handle) = cached.as_ref() {
            return Ok(handle.clone());
        }

        let handle = self.search()?;
        *cached = Some(handle.clone());
        Ok(handle)
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.lock().is_some()
    }

    /// Drop the cached handle; in-flight inferences keep their own clone
    pub fn release(&self) {
        if self.cached.lock().take().is_some() {
            log::info!("Model handle released");
        }
    }

    fn search(&self) -> Result<ModelHandle, LoadError> {
        let mut searched = Vec::new();
        let mut parse_failure = None;
        let mut copy_failure = None;

        for resolver in &self.resolvers {
            let source = resolver.source();
            match resolver.resolve() {
                Ok(Resolution::Found(path)) => match self.open(source, &path) {
                    Ok(handle) => return Ok(handle),
                    Err(e) => {
                        log::warn!("Model candidate rejected ({:?}): {}", source, e);
                        searched.push(path);
                        parse_failure.get_or_insert(e);
                    }
                },
                Ok(Resolution::Missing(paths)) => {
                    log::debug!("No model at {:?} step: {:?}", source, paths);
                    searched.extend(paths);
                }
                Err(e) => {
                    log::warn!("Model step {:?} failed: {}", source, e);
                    copy_failure.get_or_insert(e);
                }
            }
        }

        let err = parse_failure
            .or(copy_failure)
            .unwrap_or(LoadError::NotFound { searched });
        log::warn!("No usable model: {}", err);
        Err(err)
    }

    fn open(&self, source: ModelSource, path: &Path) -> Result<ModelHandle, LoadError> {
        let parse_failure = |reason: String| LoadError::ParseFailure {
            path: path.to_path_buf(),
            reason,
        };

        let digest = file_digest(path).map_err(|e| parse_failure(e.to_string()))?;
        let metadata = ModelMetadata::load_for(path);
        let engine = self.backend.open(path, &metadata).map_err(parse_failure)?;

        let info = ModelInfo {
            path: path.to_path_buf(),
            source,
            digest,
            loaded_at: chrono::Utc::now(),
        };
        log::info!(
            "Model loaded from {} via {:?} (sha256 {}, runtime {})",
            path.display(),
            source,
            &info.digest[..info.digest.len().min(12)],
            engine.runtime()
        );

        Ok(ModelHandle::new(engine, metadata, info))
    }
}

/// SHA-256 of a file, hex encoded
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
