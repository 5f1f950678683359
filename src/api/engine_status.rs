use serde::{Serialize, Deserialize};

use crate::logic::classifier::ClassifierStats;
use crate::logic::model::{ModelHandle, ModelSource};
use crate::logic::publisher::SetupState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub setup_state: SetupState,
    pub classification_enabled: bool,
    pub model: ModelStatus,

    pub inference_count: u64,
    pub failure_count: u64,
    pub avg_latency_ms: f32,
    pub dropped_results: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub runtime: Option<String>,
    pub path: Option<String>,
    pub source: Option<ModelSource>,
    pub digest: Option<String>,
    pub labels: usize,
}

impl EngineStatus {
    pub fn collect(
        setup_state: SetupState,
        classification_enabled: bool,
        model: Option<&ModelHandle>,
        stats: ClassifierStats,
        dropped_results: u64,
    ) -> Self {
        let model = match model {
            Some(handle) => ModelStatus {
                loaded: true,
                runtime: Some(handle.engine().runtime().to_string()),
                path: Some(handle.info().path.display().to_string()),
                source: Some(handle.info().source),
                digest: Some(handle.info().digest.clone()),
                labels: handle.metadata().labels.len(),
            },
            None => ModelStatus {
                loaded: false,
                runtime: None,
                path: None,
                source: None,
                digest: None,
                labels: 0,
            },
        };

        Self {
            setup_state,
            classification_enabled,
            model,
            inference_count: stats.inference_count,
            failure_count: stats.failure_count,
            avg_latency_ms: stats.avg_latency_ms,
            dropped_results,
        }
    }
}
