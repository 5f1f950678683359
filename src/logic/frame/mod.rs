//! Frame Module - camera frames on their way to the classifier
//!
//! - `gate` - admission control (minimum interval between inferences)
//! - `preprocess` - scale/crop/normalize into the model input tensor

pub mod gate;
pub mod preprocess;

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, RgbImage};

pub use gate::FrameGate;
pub use preprocess::prepare_input;

/// Immutable snapshot of a camera image plus its capture timestamp
/// (seconds on the host clock).
#[derive(Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    timestamp: f64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp: f64) -> Self {
        Self {
            image: Arc::new(image),
            timestamp,
        }
    }

    pub fn from_dynamic(image: DynamicImage, timestamp: f64) -> Self {
        Self::new(image.to_rgb8(), timestamp)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        f.debug_struct("Frame")
            .field("size", &format_args!("{}x{}", w, h))
            .field("timestamp", &self.timestamp)
            .finish()
    }
}
