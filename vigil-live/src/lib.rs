//! Vigil Live
//!
//! Streams microphone frames to the remote distress-detection engine and
//! relays its tool invocations back as typed [`SessionEvent`]s.
//!
//! ## Architecture
//!
//! ```text
//! MicrophoneProvider ──frames──> LiveSession ──ClientMessage──> LiveConnector
//!                                    │                             │
//!                                    │<──────TransportEvent────────┘
//!                                    │
//!                                    └──SessionEvent──> subscriber (controller)
//! ```
//!
//! [`GeminiLiveConnector`] is the production connector; tests substitute
//! their own [`LiveConnector`].

pub mod client;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use client::{GeminiLiveConnector, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use error::{FailureKind, LiveError, Result, SessionFailure};
pub use protocol::{
    ClientMessage, DistressTrigger, Emotion, ServerMessage, Setup, ALERTS_SENT,
    CONFIDENCE_THRESHOLD, DISTRESS_TOOL_NAME, system_directive,
};
pub use session::{LiveSession, SessionConfig, SessionEvent, SessionState};
pub use transport::{LiveConnection, LiveConnector, TransportEvent};
