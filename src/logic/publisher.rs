//! Result Publisher - the single writer of the overlay state
//!
//! The display surface subscribes to a `watch` channel and always sees the
//! latest `OverlayState`. Everything the UI shows goes through here.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::logic::classifier::RankedLabel;
use crate::logic::model::LoadError;

// ============================================================================
// SENTINEL LABELS
// ============================================================================

/// Top confidence below the threshold
pub const UNRECOGNIZED_LABEL: &str = "unrecognized";
/// Host has no physical camera, live inference cannot run
pub const UNAVAILABLE_HERE_LABEL: &str = "cannot diagnose here";
/// Classification enabled but no model is loaded
pub const MODEL_NOT_LOADED_LABEL: &str = "model not loaded";
/// Model found nowhere or failed to parse
pub const MODEL_LOAD_ERROR_LABEL: &str = "model load error";
/// Seeding the writable model copy failed
pub const MODEL_COPY_ERROR_LABEL: &str = "model file copy error";
/// Preprocess or forward pass failed
pub const INFERENCE_ERROR_LABEL: &str = "inference error";

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// What the overlay displays as the diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    /// 0.0 - 1.0
    pub confidence: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Sentinel with zero confidence
    pub fn placeholder(label: &str) -> Self {
        Self::new(label, 0.0)
    }

    pub fn for_load_error(error: &LoadError) -> Self {
        match error {
            LoadError::CopyFailure { .. } => Self::placeholder(MODEL_COPY_ERROR_LABEL),
            LoadError::NotFound { .. } | LoadError::ParseFailure { .. } => {
                Self::placeholder(MODEL_LOAD_ERROR_LABEL)
            }
        }
    }
}

/// Lifecycle of the AR session + model initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SetupState {
    #[default]
    NotStarted,
    InProgress,
    Ready,
}

/// Everything the display surface renders
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverlayState {
    pub classification_result: Option<ClassificationResult>,
    pub is_classification_enabled: bool,
    pub setup_state: SetupState,
}

impl OverlayState {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_state == SetupState::Ready
    }
}

// ============================================================================
// PUBLISHING POLICY
// ============================================================================

/// Decide what a ranking publishes.
///
/// `None` means "leave the prior result displayed".
pub fn decide(
    ranked: &[RankedLabel],
    threshold: f32,
    live_inference_available: bool,
) -> Option<ClassificationResult> {
    let top = match ranked.first() {
        Some(top) => top,
        None if !live_inference_available => {
            return Some(ClassificationResult::placeholder(UNAVAILABLE_HERE_LABEL));
        }
        None => return None,
    };

    if top.confidence < threshold {
        // Keep the measured confidence so the UI can still show it
        return Some(ClassificationResult::new(UNRECOGNIZED_LABEL, top.confidence));
    }

    Some(ClassificationResult::new(top.label.clone(), top.confidence))
}

// ============================================================================
// PUBLISHER
// ============================================================================

pub struct ResultPublisher {
    tx: watch::Sender<OverlayState>,
    threshold: f32,
    live_inference_available: bool,
}

impl ResultPublisher {
    pub fn new(threshold: f32, live_inference_available: bool) -> Self {
        let (tx, _rx) = watch::channel(OverlayState::default());
        Self {
            tx,
            threshold,
            live_inference_available,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> OverlayState {
        self.tx.borrow().clone()
    }

    /// Publish a ranking; returns what was published, if anything
    pub fn publish(&self, ranked: &[RankedLabel]) -> Option<ClassificationResult> {
        let result = decide(ranked, self.threshold, self.live_inference_available)?;
        self.set_result(result.clone());
        Some(result)
    }

    pub fn publish_placeholder(&self, label: &str) {
        self.set_result(ClassificationResult::placeholder(label));
    }

    pub fn set_result(&self, result: ClassificationResult) {
        self.tx.send_modify(|state| state.classification_result = Some(result));
    }

    /// True when `label` is what the overlay currently shows
    pub fn is_displaying(&self, label: &str) -> bool {
        self.tx
            .borrow()
            .classification_result
            .as_ref()
            .is_some_and(|r| r.label == label)
    }

    pub fn clear_result(&self) {
        self.tx.send_if_modified(|state| state.classification_result.take().is_some());
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.tx.send_if_modified(|state| {
            let changed = state.is_classification_enabled != enabled;
            state.is_classification_enabled = enabled;
            changed
        });
    }

    pub fn set_setup_state(&self, setup_state: SetupState) {
        self.tx.send_if_modified(|state| {
            let changed = state.setup_state != setup_state;
            state.setup_state = setup_state;
            changed
        });
    }

    /// Back to the initial state: no result, disabled, not started
    pub fn reset(&self) {
        self.tx.send_replace(OverlayState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(label: &str, confidence: f32) -> Vec<RankedLabel> {
        vec![
            RankedLabel { index: 0, label: label.to_string(), confidence },
            RankedLabel { index: 1, label: "other".to_string(), confidence: confidence / 2.0 },
        ]
    }

    #[test]
    fn test_below_threshold_keeps_true_confidence() {
        for i in 0..30 {
            let c = i as f32 / 100.0;
            let result = decide(&ranked("healthy", c), 0.3, true).unwrap();
            assert_eq!(result.label, UNRECOGNIZED_LABEL);
            assert_eq!(result.confidence, c);
        }
    }

    #[test]
    fn test_at_or_above_threshold_is_verbatim() {
        for i in 30..=100 {
            let c = i as f32 / 100.0;
            let result = decide(&ranked("leaf spot", c), 0.3, true).unwrap();
            assert_eq!(result, ClassificationResult::new("leaf spot", c));
        }
    }

    #[test]
    fn test_empty_ranking_keeps_prior() {
        let publisher = ResultPublisher::new(0.3, true);
        publisher.publish(&ranked("healthy", 0.9));

        assert_eq!(publisher.publish(&[]), None);
        assert_eq!(
            publisher.snapshot().classification_result,
            Some(ClassificationResult::new("healthy", 0.9))
        );
    }

    #[test]
    fn test_empty_ranking_without_camera() {
        let publisher = ResultPublisher::new(0.3, false);
        assert_eq!(
            publisher.publish(&[]),
            Some(ClassificationResult::placeholder(UNAVAILABLE_HERE_LABEL))
        );
    }

    #[test]
    fn test_subscribers_see_latest() {
        let publisher = ResultPublisher::new(0.3, true);
        let mut rx = publisher.subscribe();

        publisher.publish(&ranked("healthy", 0.5));
        publisher.publish(&ranked("rust", 0.6));

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.classification_result.unwrap().label, "rust");
    }

    #[test]
    fn test_load_error_placeholders() {
        let copy = LoadError::CopyFailure { from: "a".into(), to: "b".into(), reason: "x".into() };
        let missing = LoadError::NotFound { searched: vec![] };

        assert_eq!(ClassificationResult::for_load_error(&copy).label, MODEL_COPY_ERROR_LABEL);
        assert_eq!(ClassificationResult::for_load_error(&missing), ClassificationResult::placeholder(MODEL_LOAD_ERROR_LABEL));
    }

    #[test]
    fn test_reset() {
        let publisher = ResultPublisher::new(0.3, true);
        publisher.set_enabled(true);
        publisher.set_setup_state(SetupState::Ready);
        publisher.publish(&ranked("healthy", 0.9));

        publisher.reset();
        let state = publisher.snapshot();
        assert_eq!(state.classification_result, None);
        assert!(!state.is_classification_enabled);
        assert!(!state.is_setup_complete());
    }
}
