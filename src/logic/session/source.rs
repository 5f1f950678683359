//! AR session seam
//!
//! The platform AR session (camera + world tracking) is external. The core
//! drives it through `ArSession` and receives frames by push.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logic::frame::Frame;

/// Which planes the tracking configuration detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneDetection {
    pub horizontal: bool,
    pub vertical: bool,
}

/// World-tracking configuration handed to `ArSession::run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub plane_detection: PlaneDetection,
    pub reset_tracking: bool,
    pub remove_existing_anchors: bool,
}

impl SessionConfig {
    /// Horizontal + vertical planes, fresh tracking, no stale anchors
    pub fn world_tracking() -> Self {
        Self {
            plane_detection: PlaneDetection {
                horizontal: true,
                vertical: true,
            },
            reset_tracking: true,
            remove_existing_anchors: true,
        }
    }
}

/// Delegate callbacks of the platform session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Failed(String),
    Interrupted,
    InterruptionEnded,
}

pub trait ArSession: Send {
    /// Whether the device supports world tracking at all
    fn is_supported(&self) -> bool;

    fn run(&mut self, config: &SessionConfig) -> Result<(), String>;

    fn pause(&mut self);

    fn is_running(&self) -> bool;
}

// ============================================================================
// REPLAY SESSION
// ============================================================================

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Replays a directory of still images as a camera feed at a fixed rate.
#[derive(Debug, Clone)]
pub struct ReplaySession {
    files: Vec<PathBuf>,
    fps: f64,
    running: bool,
}

impl ReplaySession {
    pub fn from_dir(dir: &Path, fps: f64) -> std::io::Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        log::info!("Replay session: {} frames from {} @ {} fps", files.len(), dir.display(), fps);
        Ok(Self {
            files,
            fps: if fps > 0.0 { fps } else { 1.0 },
            running: false,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Decode frames lazily; timestamps advance by `1 / fps`
    pub fn frames(&self) -> impl Iterator<Item = (PathBuf, Result<Frame, image::ImageError>)> + '_ {
        let step = 1.0 / self.fps;
        self.files.iter().enumerate().map(move |(i, path)| {
            let frame = image::open(path).map(|img| Frame::from_dynamic(img, i as f64 * step));
            (path.clone(), frame)
        })
    }
}

impl ArSession for ReplaySession {
    fn is_supported(&self) -> bool {
        true
    }

    fn run(&mut self, config: &SessionConfig) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("replay directory contains no images".to_string());
        }
        log::debug!("Replay session run with {:?}", config);
        self.running = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
