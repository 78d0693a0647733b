//! Controller-owned data: system state, contact, alert log, error record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use vigil_broadcaster::AlertEntry;
use vigil_evidence::Evidence;
use vigil_live::{DistressTrigger, Emotion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    Idle,
    Connecting,
    Armed,
    /// Visible alarm; monitoring continues underneath
    Danger,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Armed => "armed",
            Self::Danger => "danger",
        }
    }

    /// True while a session is (or is being) held
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

impl EmergencyContact {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.phone.trim().is_empty()
    }
}

/// One confirmed trigger. Never modified once logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertLog {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Tool-call id from the detection engine
    pub call_id: String,
    pub reason: String,
    pub emotion: Emotion,
    pub confidence: Option<f64>,
    pub location: String,
    pub image_url: Option<String>,
    pub is_silent: bool,
}

impl AlertLog {
    pub fn new(trigger: &DistressTrigger, evidence: Evidence, is_silent: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            call_id: trigger.call_id.clone(),
            reason: trigger.reason.clone(),
            emotion: trigger.emotion,
            confidence: trigger.confidence,
            location: evidence.location,
            image_url: evidence.image_url,
            is_silent,
        }
    }

    pub fn to_entry(&self) -> AlertEntry {
        AlertEntry {
            id: self.id.to_string(),
            timestamp: self.timestamp,
            reason: self.reason.clone(),
            emotion: self.emotion.to_string(),
            confidence: self.confidence,
            location: self.location.clone(),
            image_url: self.image_url.clone(),
            is_silent: self.is_silent,
        }
    }
}

/// Displayable error; set only on the way back to IDLE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Point-in-time view served over the control socket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: SystemState,
    pub armed: bool,
    pub silent_mode: bool,
    pub blackout: bool,
    pub volume: f32,
    /// The service hung up while armed and nobody has disarmed since
    pub connection_lost: bool,
    pub alert_count: usize,
    pub contact: EmergencyContact,
    pub error: Option<ErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_requires_both_fields() {
        assert!(EmergencyContact::new("Mom", "+15550123").is_complete());
        assert!(!EmergencyContact::new("", "+15550123").is_complete());
        assert!(!EmergencyContact::new("Mom", "   ").is_complete());
        assert!(!EmergencyContact::default().is_complete());
    }

    #[test]
    fn test_alert_log_entry() {
        let trigger = DistressTrigger {
            call_id: "call-7".to_string(),
            reason: "chaotic scream".to_string(),
            emotion: Emotion::MortalFear,
            confidence: Some(0.97),
        };
        let evidence = Evidence {
            location: "1.000000, 2.000000".to_string(),
            image_url: None,
        };

        let alert = AlertLog::new(&trigger, evidence, false);
        let entry = alert.to_entry();
        assert_eq!(entry.id, alert.id.to_string());
        assert_eq!(entry.emotion, "MORTAL_FEAR");
        assert_eq!(entry.reason, "chaotic scream");
        assert!(!entry.is_silent);

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["emotion"], "MORTAL_FEAR");
        assert_eq!(json["isSilent"], false);
        assert_eq!(json["callId"], "call-7");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SystemState::Danger.as_str(), "danger");
        assert!(SystemState::Connecting.is_active());
        assert!(!SystemState::Idle.is_active());
        assert_eq!(serde_json::to_value(SystemState::Armed).unwrap(), "ARMED");
    }
}
