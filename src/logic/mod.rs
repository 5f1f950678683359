//! Logic Module - capture-to-inference pipeline
//!
//! - `model/` - model metadata, inference engine, fallback loader
//! - `frame/` - frame type, rate gate, preprocessing
//! - `classifier` - frame -> ranked labels
//! - `publisher` - threshold policy and the observable overlay state
//! - `session/` - AR session lifecycle, permission seam, frame dispatch
//! - `overlay` - text rendering of the overlay state

pub mod classifier;
pub mod config;
pub mod frame;
pub mod model;
pub mod overlay;
pub mod publisher;
pub mod session;
