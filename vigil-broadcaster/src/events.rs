use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event types broadcast to UI clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum StatusEvent {
    /// System state changed (idle, connecting, armed, danger)
    #[serde(rename = "state_change")]
    StateChange {
        state: String,
        armed: bool,
        timestamp: f64,
    },

    /// Microphone level in [0, 255]
    #[serde(rename = "volume")]
    Volume { level: f32 },

    /// A new alert was logged
    #[serde(rename = "alert")]
    Alert { alert: AlertEntry },

    /// Displayable error; the system is back at idle
    #[serde(rename = "error")]
    Error { message: String, timestamp: f64 },

    /// The detection service hung up while armed; monitoring has stopped
    /// until the operator re-arms
    #[serde(rename = "connection_lost")]
    ConnectionLost { timestamp: f64 },

    /// Silent mode or blackout toggled
    #[serde(rename = "display_change")]
    DisplayChange { silent_mode: bool, blackout: bool },
}

/// Alert as presented to UI clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub emotion: String,
    pub confidence: Option<f64>,
    pub location: String,
    pub image_url: Option<String>,
    pub is_silent: bool,
}

impl StatusEvent {
    /// Convert event to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Seconds since the Unix epoch
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
