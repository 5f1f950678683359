//! Session Module - AR session lifecycle and frame wiring
//!
//! - `controller` - setup/reset/cleanup state machine, frame dispatch
//! - `source` - `ArSession` seam and the image-directory replay session
//! - `permission` - camera permission seam

pub mod controller;
pub mod permission;
pub mod source;


pub use controller::{InferenceTask, PublishOutcome, SessionController, SessionError};
pub use permission::{PermissionProvider, PermissionStatus, StaticPermission};
pub use source::{ArSession, ReplaySession, SessionConfig, SessionEvent};
