//! PlantDoc Core - on-device plant diagnosis pipeline
//!
//! Camera frames are admitted by a rate gate, classified on a background
//! pool and published as a single current result for the overlay.

pub mod api;
pub mod constants;
pub mod logic;
