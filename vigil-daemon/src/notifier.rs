//! Outward alert notification
//!
//! One notice per confirmed alert. The shipped notifier only logs; an SMS
//! or HTTP gateway plugs in behind the same trait.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use vigil_live::Emotion;

use crate::error::NotifyError;
use crate::state::{AlertLog, EmergencyContact};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertNotice {
    pub contact_name: String,
    pub contact_phone: String,
    pub reason: String,
    pub emotion: Emotion,
    pub silent: bool,
    pub location: String,
    pub has_image: bool,
}

impl AlertNotice {
    pub fn new(contact: &EmergencyContact, alert: &AlertLog) -> Self {
        Self {
            contact_name: contact.name.clone(),
            contact_phone: contact.phone.clone(),
            reason: alert.reason.clone(),
            emotion: alert.emotion,
            silent: alert.is_silent,
            location: alert.location.clone(),
            has_image: alert.image_url.is_some(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notice: &AlertNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notice: &AlertNotice) -> Result<(), NotifyError> {
        info!(
            "🚨 ALERT for {} ({}): {} [{}] at {}{}{}",
            notice.contact_name,
            notice.contact_phone,
            notice.reason,
            notice.emotion,
            notice.location,
            if notice.has_image { ", photo attached" } else { "" },
            if notice.silent { ", silent" } else { "" },
        );
        Ok(())
    }
}
