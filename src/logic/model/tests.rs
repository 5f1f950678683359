use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array4;
use tempfile::tempdir;

use super::inference::{InferenceEngine, InferenceError, ModelBackend, ModelHandle};
use super::loader::{
    default_resolvers, DataCopyResolver, FileResolver, LoadError, ModelLoader, ModelResolver,
    ModelSource, Resolution,
};
use super::metadata::ModelMetadata;
use crate::logic::config::ModelLocations;

struct NullEngine;

impl InferenceEngine for NullEngine {
    fn run(&self, _input: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        Ok(vec![0.0])
    }

    fn runtime(&self) -> &str {
        "null"
    }
}

/// Accepts files whose content starts with "MODEL"
struct TextBackend;

impl ModelBackend for TextBackend {
    fn open(&self, path: &Path, _metadata: &ModelMetadata) -> Result<Box<dyn InferenceEngine>, String> {
        let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        if content.starts_with("MODEL") {
            Ok(Box::new(NullEngine))
        } else {
            Err("not a model".to_string())
        }
    }
}

struct CountingResolver {
    inner: FileResolver,
    calls: Arc<AtomicUsize>,
}

impl ModelResolver for CountingResolver {
    fn source(&self) -> ModelSource {
        self.inner.source()
    }

    fn resolve(&self) -> Result<Resolution, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve()
    }
}

fn locations(root: &Path) -> ModelLocations {
    ModelLocations {
        bundle_dir: root.join("bundle"),
        install_dir: root.join("install"),
        data_dir: root.join("data"),
        model_seed: None,
        model_name: "plant".to_string(),
    }
}

fn write_model(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_primary_bundle_wins() {
    let dir = tempdir().unwrap();
    let locs = locations(dir.path());
    write_model(&locs.bundle_dir.join("plant.onnx"), "MODEL primary");
    write_model(&locs.bundle_dir.join("plant.ort"), "MODEL precompiled");

    let loader = ModelLoader::from_locations(&locs, Box::new(TextBackend));
    let handle = loader.load().unwrap();

    assert_eq!(handle.info().source, ModelSource::BundlePrimary);
    assert_eq!(handle.info().path, locs.bundle_dir.join("plant.onnx"));
    assert_eq!(handle.info().digest.len(), 64);
}

#[test]
fn test_precompiled_fallback() {
    let dir = tempdir().unwrap();
    let locs = locations(dir.path());
    write_model(&locs.bundle_dir.join("plant.ort"), "MODEL precompiled");

    let loader = ModelLoader::from_locations(&locs, Box::new(TextBackend));
    assert_eq!(loader.load().unwrap().info().source, ModelSource::BundlePrecompiled);
}

#[test]
fn test_unparsable_candidate_falls_through() {
    let dir = tempdir().unwrap();
    let locs = locations(dir.path());
    write_model(&locs.bundle_dir.join("plant.onnx"), "garbage");
    write_model(&locs.install_dir.join("models").join("plant.onnx"), "MODEL installed");

    let loader = ModelLoader::from_locations(&locs, Box::new(TextBackend));
    assert_eq!(loader.load().unwrap().info().source, ModelSource::Installation);
}

#[test]
fn test_not_found_lists_searched_paths() {
    let dir = tempdir().unwrap();
    let locs = locations(dir.path());

    let loader = ModelLoader::from_locations(&locs, Box::new(TextBackend));
    match loader.load() {
        Err(LoadError::NotFound { searched }) => {
            assert_eq!(searched.len(), 4);
            assert!(searched.contains(&locs.data_dir.join("plant.onnx")));
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
    assert!(!loader.is_loaded());
}

#[test]
fn test_parse_failure_reported_over_not_found() {
    let dir = tempdir().unwrap();
    let locs = locations(dir.path());
    write_model(&locs.bundle_dir.join("plant.onnx"), "garbage");

    let loader = ModelLoader::from_locations(&locs, Box::new(TextBackend));
    match loader.load() {
        Err(LoadError::ParseFailure { path, .. }) => {
            assert_eq!(path, locs.bundle_dir.join("plant.onnx"));
        }
        other => panic!("Expected ParseFailure, got {:?}", other),
    }
}

#[test]
fn test_seed_copied_once() {
    let dir = tempdir().unwrap();
    let mut locs = locations(dir.path());
    let seed = dir.path().join("seed").join("plant.onnx");
    write_model(&seed, "MODEL seed");
    std::fs::write(ModelMetadata::sidecar_path(&seed), r#"{ "labels": ["healthy"] }"#).unwrap();
    locs.model_seed = Some(seed.clone());

    let loader = ModelLoader::from_locations(&locs, Box::new(TextBackend));
    let handle = loader.load().unwrap();
    let target = locs.data_dir.join("plant.onnx");

    assert_eq!(handle.info().source, ModelSource::DataCopy);
    assert_eq!(handle.info().path, target);
    assert_eq!(handle.metadata().labels, vec!["healthy"]);
    assert!(target.is_file());

    // The existing copy is reused even after the seed disappears
    std::fs::remove_file(&seed).unwrap();
    let resolver = DataCopyResolver::new(&locs.data_dir, "plant.onnx", Some(seed));
    assert_eq!(resolver.resolve().unwrap(), Resolution::Found(target));
}

#[test]
fn test_copy_failure() {
    let dir = tempdir().unwrap();
    let seed = dir.path().join("seed.onnx");
    write_model(&seed, "MODEL seed");

    // A regular file where the data directory should be
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "file").unwrap();

    let resolver = DataCopyResolver::new(&blocker.join("models"), "plant.onnx", Some(seed));
    match resolver.resolve() {
        Err(LoadError::CopyFailure { to, .. }) => assert_eq!(to, blocker.join("models").join("plant.onnx")),
        other => panic!("Expected CopyFailure, got {:?}", other),
    }
}

#[test]
fn test_load_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plant.onnx");
    write_model(&path, "MODEL");

    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = CountingResolver {
        inner: FileResolver::new(ModelSource::BundlePrimary, path),
        calls: calls.clone(),
    };
    let loader = ModelLoader::new(vec![Box::new(resolver)], Box::new(TextBackend));

    let first = loader.load().unwrap();
    let second = loader.load().unwrap();

    assert!(ModelHandle::same_model(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // After release the search runs again
    loader.release();
    let third = loader.load().unwrap();
    assert!(!ModelHandle::same_model(&first, &third));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_default_chain_order() {
    let locs = locations(Path::new("/opt/plantdoc"));
    let sources: Vec<ModelSource> = default_resolvers(&locs).iter().map(|r| r.source()).collect();

    assert_eq!(
        sources,
        vec![
            ModelSource::BundlePrimary,
            ModelSource::BundlePrecompiled,
            ModelSource::Installation,
            ModelSource::DataCopy,
        ]
    );
}
