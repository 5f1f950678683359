//! Session Controller - AR session lifecycle and capture-to-inference wiring
//!
//! Lifecycle, frame admission and state publication are driven from the
//! caller's (UI) context. Accepted frames are classified on the tokio
//! blocking pool; their results pass a publish guard that drops anything
//! finishing after `cleanup()` or after classification was switched off.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::engine_status::EngineStatus;
use crate::logic::classifier::{Classifier, RankedLabels};
use crate::logic::config::DiagnosisConfig;
use crate::logic::frame::{Frame, FrameGate};
use crate::logic::model::{InferenceError, ModelHandle, ModelLoader};
use crate::logic::publisher::{
    ClassificationResult, OverlayState, ResultPublisher, SetupState, INFERENCE_ERROR_LABEL,
    MODEL_NOT_LOADED_LABEL,
};
use super::permission::{ensure_granted, PermissionProvider, PermissionStatus};
use super::source::{ArSession, SessionConfig, SessionEvent};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("AR world tracking is not supported on this device")]
    Unsupported,
    #[error("failed to start AR session: {0}")]
    StartFailure(String),
    #[error("camera permission not granted ({0:?})")]
    PermissionDenied(PermissionStatus),
}

// ============================================================================
// INFERENCE TASK
// ============================================================================

/// What happened to one admitted frame
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published(ClassificationResult),
    /// Empty ranking; the prior result stays on screen
    Unchanged,
    /// Finished after teardown/disable; nothing was published
    Discarded,
    /// Inference failed; the error placeholder was published
    Failed(InferenceError),
}

/// Handle to a fire-and-forget inference. Dropping it does not cancel the
/// work; awaiting it is only needed by callers that want the outcome.
#[derive(Debug)]
pub struct InferenceTask {
    join: JoinHandle<PublishOutcome>,
}

impl InferenceTask {
    pub async fn wait(self) -> PublishOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Inference task lost: {}", e);
                PublishOutcome::Discarded
            }
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

struct ControllerState {
    setup: SetupState,
    model: Option<ModelHandle>,
    gate: FrameGate,
    /// Bumped by cleanup and by disabling; results from an older epoch are stale
    epoch: u64,
    interrupted: bool,
}

struct Shared {
    loader: ModelLoader,
    classifier: Classifier,
    publisher: ResultPublisher,
    state: Mutex<ControllerState>,
    dropped_results: AtomicU64,
}

impl Shared {
    /// Publish guard: runs on completion of every admitted inference
    fn finish(&self, epoch: u64, outcome: Result<RankedLabels, InferenceError>) -> PublishOutcome {
        // Held across publish so cleanup cannot interleave
        let state = self.state.lock();

        let still_wanted = state.epoch == epoch && state.gate.is_enabled() && state.model.is_some();
        if !still_wanted {
            self.dropped_results.fetch_add(1, Ordering::Relaxed);
            log::info!("Discarding late inference result (epoch {} -> {})", epoch, state.epoch);
            return PublishOutcome::Discarded;
        }

        match outcome {
            Ok(ranked) => match self.publisher.publish(&ranked) {
                Some(result) => PublishOutcome::Published(result),
                None => PublishOutcome::Unchanged,
            },
            Err(e) => {
                self.publisher.publish_placeholder(INFERENCE_ERROR_LABEL);
                PublishOutcome::Failed(e)
            }
        }
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct SessionController {
    session: Mutex<Box<dyn ArSession>>,
    shared: Arc<Shared>,
    runtime: Handle,
}

impl SessionController {
    pub fn new(
        config: &DiagnosisConfig,
        session: Box<dyn ArSession>,
        loader: ModelLoader,
        runtime: Handle,
    ) -> Self {
        let state = ControllerState {
            setup: SetupState::NotStarted,
            model: None,
            gate: FrameGate::new(config.gate_interval_secs),
            epoch: 0,
            interrupted: false,
        };

        Self {
            session: Mutex::new(session),
            shared: Arc::new(Shared {
                loader,
                classifier: Classifier::new(),
                publisher: ResultPublisher::new(
                    config.confidence_threshold,
                    config.live_inference_available,
                ),
                state: Mutex::new(state),
                dropped_results: AtomicU64::new(0),
            }),
            runtime,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.shared.publisher.subscribe()
    }

    pub fn snapshot(&self) -> OverlayState {
        self.shared.publisher.snapshot()
    }

    pub fn setup_state(&self) -> SetupState {
        self.shared.state.lock().setup
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_state() == SetupState::Ready
    }

    pub fn is_classification_enabled(&self) -> bool {
        self.shared.state.lock().gate.is_enabled()
    }

    pub fn classification_result(&self) -> Option<ClassificationResult> {
        self.snapshot().classification_result
    }

    pub fn model(&self) -> Option<ModelHandle> {
        self.shared.state.lock().model.clone()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Start the AR session and load the model.
    ///
    /// When already `Ready` only the model step runs again, so a failed load
    /// can be retried without restarting tracking.
    pub fn setup(&self) -> Result<(), SessionError> {
        if self.is_setup_complete() {
            log::info!("Session already running, retrying model load only");
            self.load_model();
            return Ok(());
        }

        {
            let mut session = self.session.lock();
            session.pause();

            if !session.is_supported() {
                log::warn!("AR world tracking unsupported, setup halted");
                return Err(SessionError::Unsupported);
            }

            self.set_setup_state(SetupState::InProgress);

            if let Err(reason) = session.run(&SessionConfig::world_tracking()) {
                log::warn!("AR session failed to start: {}", reason);
                self.set_setup_state(SetupState::NotStarted);
                return Err(SessionError::StartFailure(reason));
            }
        }
        log::info!("AR session started");

        self.load_model();
        self.set_setup_state(SetupState::Ready);
        Ok(())
    }

    /// Restart tracking and clear the displayed result; model stays loaded.
    /// Before `Ready` this goes through the whole setup path instead.
    pub fn reset_session(&self) {
        self.shared.state.lock().gate.rearm();
        self.shared.publisher.clear_result();

        if self.is_setup_complete() {
            let mut session = self.session.lock();
            if let Err(reason) = session.run(&SessionConfig::world_tracking()) {
                log::warn!("AR session reset failed: {}", reason);
            } else {
                log::info!("AR session reset");
            }
        }

        self.retry_setup();
    }

    /// Pause the session and drop everything back to `NotStarted`.
    /// In-flight inferences finish but their results are discarded.
    pub fn cleanup(&self) {
        self.session.lock().pause();
        self.shared.loader.release();

        {
            let mut state = self.shared.state.lock();
            state.model = None;
            state.gate.clear();
            state.epoch += 1;
            state.setup = SetupState::NotStarted;
            state.interrupted = false;
            self.shared.publisher.reset();
        }
        log::info!("Session cleaned up");
    }

    // ------------------------------------------------------------------------
    // Classification toggle
    // ------------------------------------------------------------------------

    /// Flip the user-controlled enabled flag. Enabling requires a granted
    /// camera permission; disabling never does. Returns the new flag.
    pub fn toggle_classification(&self, permission: &dyn PermissionProvider) -> Result<bool, SessionError> {
        if self.is_classification_enabled() {
            self.set_enabled(false);
            return Ok(false);
        }

        ensure_granted(permission).map_err(|status| {
            log::warn!("Classification not enabled: camera permission {:?}", status);
            SessionError::PermissionDenied(status)
        })?;

        self.set_enabled(true);
        self.retry_setup();
        Ok(true)
    }

    fn set_enabled(&self, enabled: bool) {
        let mut state = self.shared.state.lock();
        state.gate.set_enabled(enabled);
        if !enabled {
            // In-flight results belong to the previous enable cycle
            state.epoch += 1;
        }
        self.shared.publisher.set_enabled(enabled);
        log::info!("Classification {}", if enabled { "enabled" } else { "disabled" });
    }

    // ------------------------------------------------------------------------
    // Frame delivery
    // ------------------------------------------------------------------------

    /// Push callback for camera frames. Returns the task handle when the
    /// frame was admitted; rejected frames are dropped.
    pub fn on_frame(&self, frame: Frame) -> Option<InferenceTask> {
        let (model, epoch) = {
            let mut state = self.shared.state.lock();
            if state.interrupted {
                return None;
            }

            if state.gate.is_enabled() && state.model.is_none() {
                if !self.shared.publisher.is_displaying(MODEL_NOT_LOADED_LABEL) {
                    self.shared.publisher.publish_placeholder(MODEL_NOT_LOADED_LABEL);
                }
                return None;
            }

            let now = frame.timestamp();
            if !state.gate.accept(&frame, now) {
                return None;
            }
            (state.model.clone()?, state.epoch)
        };

        let shared = self.shared.clone();
        let classify = self.runtime.spawn_blocking({
            let shared = shared.clone();
            move || shared.classifier.classify(&frame, &model)
        });

        let join = self.runtime.spawn(async move {
            let outcome = match classify.await {
                Ok(outcome) => outcome,
                Err(e) => Err(InferenceError::ModelFailure(format!("inference task failed: {}", e))),
            };
            shared.finish(epoch, outcome)
        });

        Some(InferenceTask { join })
    }

    /// Delegate callbacks from the platform session
    pub fn on_session_event(&self, event: SessionEvent) {
        let mut state = self.shared.state.lock();
        match event {
            SessionEvent::Failed(reason) => {
                log::error!("AR session failed: {}", reason);
            }
            SessionEvent::Interrupted => {
                log::warn!("AR session interrupted");
                state.interrupted = true;
            }
            SessionEvent::InterruptionEnded => {
                log::info!("AR session interruption ended");
                state.interrupted = false;
                state.gate.rearm();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    pub fn status(&self) -> EngineStatus {
        let (setup_state, enabled, model) = {
            let state = self.shared.state.lock();
            (state.setup, state.gate.is_enabled(), state.model.clone())
        };

        EngineStatus::collect(
            setup_state,
            enabled,
            model.as_ref(),
            self.shared.classifier.stats(),
            self.shared.dropped_results.load(Ordering::Relaxed),
        )
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn load_model(&self) {
        match self.shared.loader.load() {
            Ok(handle) => {
                let mut state = self.shared.state.lock();
                state.model = Some(handle);
                state.gate.set_model_present(true);
            }
            Err(e) => {
                log::warn!("Diagnosis unavailable: {}", e);
                let mut state = self.shared.state.lock();
                state.model = None;
                state.gate.set_model_present(false);
                self.shared.publisher.set_result(ClassificationResult::for_load_error(&e));
            }
        }
    }

    /// User actions re-attempt whatever setup is still missing: the full
    /// setup before `Ready`, only the model load after it.
    fn retry_setup(&self) {
        let (ready, model_missing) = {
            let state = self.shared.state.lock();
            (state.setup == SetupState::Ready, state.model.is_none())
        };

        if !ready {
            if let Err(e) = self.setup() {
                log::warn!("Setup retry failed: {}", e);
            }
        } else if model_missing {
            self.load_model();
        }
    }

    fn set_setup_state(&self, setup: SetupState) {
        self.shared.state.lock().setup = setup;
        self.shared.publisher.set_setup_state(setup);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cleanup();
    }
}
