//! Evidence capture
//!
//! Location and photo are gathered side by side. Neither can fail the
//! capture: a missing position becomes [`UNKNOWN_LOCATION`] and a missing
//! photo becomes `None`. Captures share no mutable state, so duplicate
//! triggers may capture concurrently.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::camera::CameraStream;
use crate::error::{EvidenceError, Result};
use crate::location::LocationProvider;
use crate::snapshot::{encode_jpeg_data_url, JPEG_QUALITY};

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on grabbing and encoding one frame
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub location: String,
    /// JPEG data URL; `None` when no frame could be taken
    pub image_url: Option<String>,
}

impl Evidence {
    pub fn has_location(&self) -> bool {
        self.location != UNKNOWN_LOCATION
    }
}

pub struct EvidenceCapture {
    location: Arc<dyn LocationProvider>,
    location_timeout: Duration,
    snapshot_timeout: Duration,
    jpeg_quality: u8,
}

impl EvidenceCapture {
    pub fn new(location: Arc<dyn LocationProvider>) -> Self {
        Self {
            location,
            location_timeout: LOCATION_TIMEOUT,
            snapshot_timeout: SNAPSHOT_TIMEOUT,
            jpeg_quality: JPEG_QUALITY,
        }
    }

    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Gather both pieces; latency is that of the slower one
    pub async fn capture(&self, camera: Option<Arc<dyn CameraStream>>) -> Evidence {
        let (location, image_url) = tokio::join!(self.capture_location(), self.capture_image(camera));
        debug!(
            "Evidence captured: location={}, image={}",
            location,
            image_url.is_some()
        );
        Evidence { location, image_url }
    }

    async fn capture_location(&self) -> String {
        match tokio::time::timeout(self.location_timeout, self.location.locate()).await {
            Ok(Ok(coordinates)) => coordinates.to_string(),
            Ok(Err(e)) => {
                warn!("Location unavailable: {}", e);
                UNKNOWN_LOCATION.to_string()
            }
            Err(_) => {
                warn!("Location lookup timed out after {:?}", self.location_timeout);
                UNKNOWN_LOCATION.to_string()
            }
        }
    }

    async fn capture_image(&self, camera: Option<Arc<dyn CameraStream>>) -> Option<String> {
        match tokio::time::timeout(self.snapshot_timeout, self.snapshot(camera)).await {
            Ok(Ok(url)) => Some(url),
            Ok(Err(e)) => {
                warn!("Snapshot unavailable: {}", e);
                None
            }
            Err(_) => {
                warn!("Snapshot timed out after {:?}", self.snapshot_timeout);
                None
            }
        }
    }

    async fn snapshot(&self, camera: Option<Arc<dyn CameraStream>>) -> Result<String> {
        let camera = camera.ok_or_else(|| EvidenceError::feed_not_ready("no camera stream"))?;
        if !camera.is_live() {
            return Err(EvidenceError::feed_not_ready("camera stream ended"));
        }

        let frame = camera.current_frame().await?;
        let quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || encode_jpeg_data_url(&frame, quality)).await?
    }
}
