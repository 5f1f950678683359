//! Frame Gate - bounded inference rate
//!
//! The frame source pushes faster than inference can keep up; the gate is the
//! only backpressure. Rejected frames are dropped, nothing is queued.

use super::Frame;

#[derive(Debug, Clone)]
pub struct FrameGate {
    min_interval: f64,
    last_accepted_at: Option<f64>,
    enabled: bool,
    model_present: bool,
}

impl FrameGate {
    pub fn new(min_interval: f64) -> Self {
        Self {
            min_interval,
            last_accepted_at: None,
            enabled: false,
            model_present: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_model_present(&mut self, present: bool) {
        self.model_present = present;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_accepted_at(&self) -> Option<f64> {
        self.last_accepted_at
    }

    /// Admit `frame` at host time `now`.
    ///
    /// Accepts iff classification is enabled, a model is present and more
    /// than `min_interval` has passed since the last accepted frame. The
    /// timestamp is recorded before returning, so a second frame delivered
    /// right behind this one is rejected.
    pub fn accept(&mut self, frame: &Frame, now: f64) -> bool {
        if !self.enabled || !self.model_present || !now.is_finite() {
            return false;
        }

        if let Some(last) = self.last_accepted_at {
            if now - last <= self.min_interval {
                log::debug!(
                    "Frame @{:.3} gated ({:.3}s since last inference)",
                    frame.timestamp(),
                    now - last
                );
                return false;
            }
        }

        self.last_accepted_at = Some(now);
        true
    }

    /// Forget the last admission so the next eligible frame passes
    pub fn rearm(&mut self) {
        self.last_accepted_at = None;
    }

    /// Back to the initial state: disabled, no model, re-armed
    pub fn clear(&mut self) {
        self.rearm();
        self.enabled = false;
        self.model_present = false;
    }
}
