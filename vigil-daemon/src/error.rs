//! Errors surfaced by the controller.
//!
//! Every variant displays as the message shown to the operator; the raw
//! platform error only appears in the generic fallbacks.

use thiserror::Error;

use vigil_evidence::EvidenceError;
use vigil_live::{FailureKind, LiveError, SessionFailure};

pub type Result<T> = std::result::Result<T, ControllerError>;

pub const SETUP_MESSAGE: &str = "Please enter an emergency contact name and phone number.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("{0}")]
    SetupValidation(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    DeviceAbsent(String),

    #[error("{0}")]
    DeviceBusy(String),

    /// Device failure outside the named conditions
    #[error("{0}")]
    Device(String),

    #[error("{0}")]
    Connection(String),

    #[error("Monitoring is already active. Disarm before arming again.")]
    AlreadyArmed,
}

impl ControllerError {
    pub fn setup() -> Self {
        Self::SetupValidation(SETUP_MESSAGE.to_string())
    }

    /// Camera acquisition failure during arming
    pub fn from_camera(err: &EvidenceError) -> Self {
        match err {
            EvidenceError::PermissionDenied(_) => Self::PermissionDenied(
                "Camera access was denied. Allow camera access to arm monitoring.".to_string(),
            ),
            EvidenceError::DeviceAbsent(_) => Self::DeviceAbsent(
                "No camera was found. A camera is required to arm monitoring.".to_string(),
            ),
            EvidenceError::DeviceBusy(_) => {
                Self::DeviceBusy("The camera is being used by another application.".to_string())
            }
            other => Self::Device(format!("Camera error: {}", other)),
        }
    }

    pub fn from_failure(failure: &SessionFailure) -> Self {
        let message = failure.message.clone();
        match failure.kind {
            FailureKind::PermissionDenied => Self::PermissionDenied(message),
            FailureKind::DeviceAbsent => Self::DeviceAbsent(message),
            FailureKind::DeviceBusy => Self::DeviceBusy(message),
            FailureKind::Device => Self::Device(message),
            FailureKind::Connection => Self::Connection(message),
        }
    }
}

impl From<&LiveError> for ControllerError {
    fn from(err: &LiveError) -> Self {
        match err {
            LiveError::AlreadyActive => Self::AlreadyArmed,
            other => Self::from_failure(&other.failure()),
        }
    }
}

/// Wake-lock acquisition failure. Never fatal to arming.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Wake lock unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outward notification could not be delivered
#[derive(Error, Debug)]
#[error("Notification dispatch failed: {0}")]
pub struct NotifyError(pub String);
