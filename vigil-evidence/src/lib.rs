//! Vigil Evidence
//!
//! Best-effort corroborating evidence for an alert: where the device is
//! and what its camera sees.

pub mod camera;
pub mod capture;
pub mod error;
pub mod location;
pub mod snapshot;

pub use camera::{default_snapshot_command, CameraProvider, CameraStream, CommandCamera, FacingMode};
pub use capture::{Evidence, EvidenceCapture, LOCATION_TIMEOUT, SNAPSHOT_TIMEOUT, UNKNOWN_LOCATION};
pub use error::{EvidenceError, Result};
pub use location::{Coordinates, FixedLocation, LocationProvider, NoLocation};
pub use snapshot::{encode_jpeg_data_url, JPEG_QUALITY};
