//! API Module
//!
//! Serializable reports for whatever UI hosts the core.

pub mod engine_status;

pub use engine_status::{EngineStatus, ModelStatus};
