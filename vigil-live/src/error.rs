//! Error types for the live session

use thiserror::Error;
use vigil_audio::AudioError;

pub type Result<T> = std::result::Result<T, LiveError>;

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("Live session already active")]
    AlreadyActive,

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LiveError {
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Normalize into the failure reported to the session subscriber
    pub fn failure(&self) -> SessionFailure {
        match self {
            Self::Audio(AudioError::PermissionDenied(_)) => SessionFailure::new(
                FailureKind::PermissionDenied,
                "Microphone access was denied. Allow microphone access and try again.",
            ),
            Self::Audio(AudioError::DeviceAbsent(_)) => SessionFailure::new(
                FailureKind::DeviceAbsent,
                "No microphone was found. Connect a microphone and try again.",
            ),
            Self::Audio(AudioError::DeviceBusy(_)) => SessionFailure::new(
                FailureKind::DeviceBusy,
                "The microphone is being used by another application.",
            ),
            Self::Audio(other) => {
                SessionFailure::new(FailureKind::Device, format!("Microphone error: {}", other))
            }
            Self::Connection(msg) => SessionFailure::connection(msg.clone()),
            other => SessionFailure::new(FailureKind::Connection, other.to_string()),
        }
    }
}

/// Broad cause of a session failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    DeviceAbsent,
    DeviceBusy,
    /// Microphone failure outside the three named conditions
    Device,
    Connection,
}

/// A failure with its human-readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SessionFailure {
    pub fn new<S: Into<String>>(kind: FailureKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Transport failure; the raw reason is kept behind a fixed prefix
    pub fn connection<S: Into<String>>(reason: S) -> Self {
        let reason = reason.into();
        let message = if reason.is_empty() {
            "Connection to the detection service failed.".to_string()
        } else {
            format!("Connection to the detection service failed: {}", reason)
        };
        Self::new(FailureKind::Connection, message)
    }
}

impl std::fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
