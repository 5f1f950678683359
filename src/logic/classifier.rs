//! Classifier - one accepted frame in, ranked labels out
//!
//! preprocess -> forward pass -> normalize -> rank. Blocking; callers run it
//! on the background pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::logic::frame::{prepare_input, Frame};
use crate::logic::model::{InferenceError, ModelHandle, ModelMetadata};

/// One entry of a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
}

/// Descending by confidence; ties keep the lower output index first
pub type RankedLabels = Vec<RankedLabel>;

/// Rank raw model outputs against the model's vocabulary
pub fn rank(raw: &[f32], metadata: &ModelMetadata) -> RankedLabels {
    let scores = metadata.score_normalization.apply(raw);

    let mut ranked: RankedLabels = scores
        .into_iter()
        .enumerate()
        .map(|(index, confidence)| RankedLabel {
            index,
            label: metadata.label(index).to_string(),
            confidence,
        })
        .collect();

    // Stable sort keeps first-encountered index on ties
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}

/// Latency bookkeeping for the engine status report
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClassifierStats {
    pub inference_count: u64,
    pub failure_count: u64,
    pub avg_latency_ms: f32,
}

#[derive(Debug, Default)]
pub struct Classifier {
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
    failure_count: AtomicU64,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, frame: &Frame, model: &ModelHandle) -> Result<RankedLabels, InferenceError> {
        let start_time = Instant::now();
        let result = Self::run(frame, model);

        match &result {
            Ok(ranked) => {
                let elapsed = start_time.elapsed().as_micros() as u64;
                self.latency_sum_us.fetch_add(elapsed, Ordering::Relaxed);
                self.inference_count.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "Frame @{:.3} classified in {}us, top: {:?}",
                    frame.timestamp(),
                    elapsed,
                    ranked.first().map(|r| (&r.label, r.confidence))
                );
            }
            Err(e) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                log::warn!("Frame @{:.3} not classified: {}", frame.timestamp(), e);
            }
        }

        result
    }

    fn run(frame: &Frame, model: &ModelHandle) -> Result<RankedLabels, InferenceError> {
        let metadata = model.metadata();
        let input = prepare_input(frame.image(), metadata.input_size, metadata.mean, metadata.std)?;
        let raw = model.engine().run(input)?;
        Ok(rank(&raw, metadata))
    }

    pub fn stats(&self) -> ClassifierStats {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        ClassifierStats {
            inference_count: count,
            failure_count: self.failure_count.load(Ordering::Relaxed),
            avg_latency_ms: avg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::{InferenceEngine, ModelInfo, ModelSource, ScoreNormalization, UNKNOWN_CLASS_LABEL};
    use image::RgbImage;
    use ndarray::Array4;

    /// Echoes the mean of the red channel as the score of class 0
    struct MeanEngine;

    impl InferenceEngine for MeanEngine {
        fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            let red = input.index_axis(ndarray::Axis(1), 0).mean().unwrap_or(0.0);
            Ok(vec![red, 1.0 - red])
        }

        fn runtime(&self) -> &str {
            "mean"
        }
    }

    struct BrokenEngine;

    impl InferenceEngine for BrokenEngine {
        fn run(&self, _input: Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::ModelFailure("boom".to_string()))
        }

        fn runtime(&self) -> &str {
            "broken"
        }
    }

    fn handle(engine: Box<dyn InferenceEngine>) -> ModelHandle {
        let mut metadata = ModelMetadata::with_labels(["healthy", "blight"]);
        metadata.score_normalization = ScoreNormalization::None;
        metadata.input_size = 8;
        ModelHandle::new(
            engine,
            metadata,
            ModelInfo {
                path: "mem".into(),
                source: ModelSource::BundlePrimary,
                digest: String::new(),
                loaded_at: chrono::Utc::now(),
            },
        )
    }

    #[test]
    fn test_rank_orders_descending() {
        let metadata = ModelMetadata::with_labels(["a", "b", "c"]);
        let ranked = rank(&[10.0, 80.0, 30.0], &metadata);

        let labels: Vec<&str> = ranked.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "c", "a"]);
        assert_eq!(ranked[0].confidence, 0.8);
    }

    #[test]
    fn test_rank_ties_keep_first_index() {
        let metadata = ModelMetadata::with_labels(["a", "b", "c"]);
        let ranked = rank(&[50.0, 70.0, 70.0], &metadata);
        assert_eq!(ranked[0].index, 1);
        assert_eq!(ranked[1].index, 2);
    }

    #[test]
    fn test_rank_out_of_vocabulary() {
        let metadata = ModelMetadata::with_labels(["a"]);
        let ranked = rank(&[10.0, 90.0], &metadata);
        assert_eq!(ranked[0].label, UNKNOWN_CLASS_LABEL);
        assert_eq!(ranked[0].index, 1);
    }

    #[test]
    fn test_rank_empty_output() {
        assert!(rank(&[], &ModelMetadata::default()).is_empty());
    }

    #[test]
    fn test_classify_is_deterministic() {
        let classifier = Classifier::new();
        let model = handle(Box::new(MeanEngine));
        let frame = Frame::new(RgbImage::from_pixel(32, 16, image::Rgb([255, 0, 0])), 0.0);

        let first = classifier.classify(&frame, &model).unwrap();
        let second = classifier.classify(&frame, &model).unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].label, "healthy");
        assert!((first[0].confidence - 1.0).abs() < 1e-6);
        assert_eq!(classifier.stats().inference_count, 2);
    }

    #[test]
    fn test_model_failure_is_reported() {
        let classifier = Classifier::new();
        let model = handle(Box::new(BrokenEngine));
        let frame = Frame::new(RgbImage::new(8, 8), 0.0);

        assert_eq!(
            classifier.classify(&frame, &model),
            Err(InferenceError::ModelFailure("boom".to_string()))
        );
        assert_eq!(classifier.stats().failure_count, 1);
        assert_eq!(classifier.stats().inference_count, 0);
    }

    #[test]
    fn test_empty_frame_is_preprocess_failure() {
        let classifier = Classifier::new();
        let model = handle(Box::new(MeanEngine));
        let frame = Frame::new(RgbImage::new(0, 0), 0.0);

        assert!(matches!(classifier.classify(&frame, &model), Err(InferenceError::Preprocess(_))));
    }
}
