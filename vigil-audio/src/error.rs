//! Error types for microphone capture

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AudioError>;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("No microphone found: {0}")]
    DeviceAbsent(String),

    #[error("Microphone busy: {0}")]
    DeviceBusy(String),

    #[error("Audio device error: {0}")]
    DeviceError(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resampling error: {0}")]
    ResampleError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::DeviceError(msg.into())
    }

    pub fn stream<S: Into<String>>(msg: S) -> Self {
        Self::StreamError(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Sort a raw host error message into the denied / absent / busy buckets.
    ///
    /// Hosts only hand back free-form strings for these conditions, so the
    /// classification is keyword based. Anything unrecognised stays a
    /// generic device error carrying the original text.
    pub fn classify<S: Into<String>>(msg: S) -> Self {
        let msg = msg.into();
        let lower = msg.to_lowercase();

        if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
            Self::PermissionDenied(msg)
        } else if lower.contains("busy") || lower.contains("in use") || lower.contains("could not start") {
            Self::DeviceBusy(msg)
        } else if lower.contains("not available")
            || lower.contains("no longer available")
            || lower.contains("no such device")
            || lower.contains("not found")
            || lower.contains("no default")
        {
            Self::DeviceAbsent(msg)
        } else {
            Self::DeviceError(msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_permission() {
        let err = AudioError::classify("Permission denied (os error 13)");
        assert!(matches!(err, AudioError::PermissionDenied(_)));
    }

    #[test]
    fn test_classify_busy() {
        let err = AudioError::classify("Device or resource busy");
        assert!(matches!(err, AudioError::DeviceBusy(_)));
    }

    #[test]
    fn test_classify_absent() {
        let err = AudioError::classify("The requested device is no longer available");
        assert!(matches!(err, AudioError::DeviceAbsent(_)));
    }

    #[test]
    fn test_classify_fallback_keeps_message() {
        match AudioError::classify("snd_pcm_hw_params failed") {
            AudioError::DeviceError(msg) => assert_eq!(msg, "snd_pcm_hw_params failed"),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
