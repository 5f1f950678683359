//! PlantDoc Replay - headless driver for the diagnosis core
//!
//! Replays a directory of images as the camera feed and prints what the
//! overlay would display.
//!
//! Usage: `plantdoc-replay <frames dir>` (or `PLANTDOC_FRAMES_DIR`).
//! `PLANTDOC_CONFIG` points at an optional JSON config; otherwise the
//! `PLANTDOC_*` environment variables and defaults apply.

use std::path::PathBuf;

use anyhow::{Context, Result};

use plantdoc_core::constants::{APP_NAME, APP_VERSION};
use plantdoc_core::logic::config::DiagnosisConfig;
use plantdoc_core::logic::model::{ModelLoader, OnnxBackend};
use plantdoc_core::logic::overlay;
use plantdoc_core::logic::session::{
    PermissionStatus, PublishOutcome, ReplaySession, SessionController, StaticPermission,
};

fn load_config() -> Result<DiagnosisConfig> {
    match std::env::var("PLANTDOC_CONFIG") {
        Ok(path) => DiagnosisConfig::from_file(&PathBuf::from(path)).context("loading PLANTDOC_CONFIG"),
        Err(_) => Ok(DiagnosisConfig::from_env()),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    log::info!("Starting {} v{} (replay)", APP_NAME, APP_VERSION);

    let frames_dir = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PLANTDOC_FRAMES_DIR").ok())
        .map(PathBuf::from)
        .context("missing frames directory (argument or PLANTDOC_FRAMES_DIR)")?;
    let fps: f64 = std::env::var("PLANTDOC_REPLAY_FPS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1.0);

    let config = load_config()?;
    log::info!("Model search: {:?}", config.models);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building inference runtime")?;

    let replay = ReplaySession::from_dir(&frames_dir, fps)
        .with_context(|| format!("reading frames from {}", frames_dir.display()))?;
    if replay.is_empty() {
        anyhow::bail!("no images found in {}", frames_dir.display());
    }
    log::info!("Replaying {} frames", replay.len());

    let loader = ModelLoader::from_locations(&config.models, Box::new(OnnxBackend));
    let controller = SessionController::new(
        &config,
        Box::new(replay.clone()),
        loader,
        runtime.handle().clone(),
    );
    let mut overlay_rx = controller.subscribe();

    if let Err(e) = controller.setup() {
        log::warn!("Session setup: {}", e);
    }
    if let Err(e) = controller.toggle_classification(&StaticPermission(PermissionStatus::Authorized)) {
        log::warn!("Classification toggle: {}", e);
    }

    runtime.block_on(async {
        for (path, frame) in replay.frames() {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            // Replay waits so each admitted frame's result prints in order
            if let Some(task) = controller.on_frame(frame) {
                if let PublishOutcome::Failed(e) = task.wait().await {
                    log::warn!("{}: {}", path.display(), e);
                }
            }

            if overlay_rx.has_changed().unwrap_or(false) {
                let view = overlay::render(&overlay_rx.borrow_and_update());
                println!("{}\t{} | {}", path.display(), view.headline, view.caption);
            }
        }
    });

    println!("{}", serde_json::to_string_pretty(&controller.status())?);
    controller.cleanup();
    Ok(())
}
