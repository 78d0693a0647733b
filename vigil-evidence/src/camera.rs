//! Camera capability
//!
//! A camera stream is acquired once while arming and kept live so a frame
//! can be grabbed the moment a trigger arrives.

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{EvidenceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    User,
    /// Rear camera, pointed away from the user
    Environment,
}

#[async_trait]
pub trait CameraProvider: Send + Sync {
    /// Acquire a video-only stream
    async fn acquire(&self, facing: FacingMode) -> Result<Arc<dyn CameraStream>>;
}

#[async_trait]
pub trait CameraStream: Send + Sync {
    /// Current frame of the live feed
    async fn current_frame(&self) -> Result<RgbImage>;

    /// End the stream. Idempotent.
    fn release(&self);

    fn is_live(&self) -> bool;
}

/// Placeholder substituted with the device path in snapshot commands
pub const DEVICE_PLACEHOLDER: &str = "{device}";

/// Grab one PNG frame from a V4L2 device on stdout
pub fn default_snapshot_command() -> Vec<String> {
    [
        "ffmpeg",
        "-loglevel",
        "error",
        "-f",
        "v4l2",
        "-i",
        DEVICE_PLACEHOLDER,
        "-frames:v",
        "1",
        "-f",
        "image2pipe",
        "-vcodec",
        "png",
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Camera backed by a device node and an external snapshot command.
///
/// The command must write a single encoded image (any format the `image`
/// crate can decode) to stdout.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    device: PathBuf,
    command: Vec<String>,
}

impl CommandCamera {
    pub fn new(device: impl Into<PathBuf>, command: Vec<String>) -> Self {
        Self {
            device: device.into(),
            command,
        }
    }
}

#[async_trait]
impl CameraProvider for CommandCamera {
    async fn acquire(&self, facing: FacingMode) -> Result<Arc<dyn CameraStream>> {
        let device = self.device.display().to_string();
        if self.command.is_empty() {
            return Err(EvidenceError::unavailable("no snapshot command configured"));
        }

        // Opening the node surfaces denied/absent/busy before arming completes
        tokio::fs::File::open(&self.device)
            .await
            .map_err(|e| EvidenceError::from_device_io(&device, e))?;

        info!("Camera {} acquired ({:?})", device, facing);
        Ok(Arc::new(CommandCameraStream {
            device,
            command: self.command.clone(),
            live: AtomicBool::new(true),
        }))
    }
}

struct CommandCameraStream {
    device: String,
    command: Vec<String>,
    live: AtomicBool,
}

#[async_trait]
impl CameraStream for CommandCameraStream {
    async fn current_frame(&self) -> Result<RgbImage> {
        if !self.is_live() {
            return Err(EvidenceError::feed_not_ready("camera released"));
        }

        let args: Vec<String> = self.command[1..]
            .iter()
            .map(|arg| arg.replace(DEVICE_PLACEHOLDER, &self.device))
            .collect();

        let output = Command::new(&self.command[0])
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvidenceError::feed_not_ready(format!(
                "snapshot command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(EvidenceError::feed_not_ready("snapshot command produced no image"));
        }

        let frame = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&output.stdout).map(|decoded| decoded.to_rgb8())
        })
        .await??;
        debug!("Grabbed {}x{} frame from {}", frame.width(), frame.height(), self.device);
        Ok(frame)
    }

    fn release(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            info!("Camera {} released", self.device);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}
