//! Error types for evidence capture.
//!
//! None of these reach an alert: capture degrades to "Unknown Location" or
//! a missing image instead. Camera acquisition is the exception, since it
//! happens while arming.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvidenceError>;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceAbsent(String),

    #[error("Device busy: {0}")]
    DeviceBusy(String),

    #[error("Camera feed not ready: {0}")]
    FeedNotReady(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvidenceError {
    pub fn feed_not_ready<S: Into<String>>(msg: S) -> Self {
        Self::FeedNotReady(msg.into())
    }

    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Map an error from opening a device node
    pub fn from_device_io(device: &str, err: std::io::Error) -> Self {
        // EBUSY has no stable ErrorKind
        const EBUSY: i32 = 16;

        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(device.to_string()),
            std::io::ErrorKind::NotFound => Self::DeviceAbsent(device.to_string()),
            _ if err.raw_os_error() == Some(EBUSY) => Self::DeviceBusy(device.to_string()),
            _ => Self::Io(err),
        }
    }
}

impl From<tokio::task::JoinError> for EvidenceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Encode(format!("image task failed: {}", err))
    }
}

impl From<image::ImageError> for EvidenceError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_device_io_mapping() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(
            EvidenceError::from_device_io("/dev/video0", denied),
            EvidenceError::PermissionDenied(_)
        ));

        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(
            EvidenceError::from_device_io("/dev/video0", missing),
            EvidenceError::DeviceAbsent(_)
        ));

        let busy = io::Error::from_raw_os_error(16);
        assert!(matches!(
            EvidenceError::from_device_io("/dev/video0", busy),
            EvidenceError::DeviceBusy(_)
        ));
    }
}
