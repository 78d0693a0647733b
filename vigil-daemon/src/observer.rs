//! UI observer contract
//!
//! The controller reports through [`StateObserver`] after releasing its own
//! locks. [`BroadcastObserver`] queues the updates for a task that feeds the
//! status broadcaster, so observer calls never wait on socket I/O.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use vigil_broadcaster::{AlertEntry, StatusBroadcaster};

use crate::state::{AlertLog, ErrorRecord, SystemState};

pub trait StateObserver: Send + Sync {
    fn state_changed(&self, _state: SystemState, _armed: bool) {}

    /// Level in [0, 255]
    fn volume_changed(&self, _level: f32) {}

    fn alert_logged(&self, _alert: &AlertLog) {}

    fn error_raised(&self, _error: &ErrorRecord) {}

    /// The detection service went away while armed
    fn connection_lost(&self) {}

    fn display_changed(&self, _silent_mode: bool, _blackout: bool) {}
}

#[derive(Debug, Default, Clone)]
pub struct NullObserver;

impl StateObserver for NullObserver {}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    State { state: SystemState, armed: bool },
    Volume(f32),
    Alert(AlertEntry),
    Error(String),
    ConnectionLost,
    Display { silent_mode: bool, blackout: bool },
}

pub struct BroadcastObserver {
    tx: mpsc::UnboundedSender<UiUpdate>,
}

impl BroadcastObserver {
    /// Returns the observer and the forwarding task for `broadcaster`
    pub fn new(broadcaster: Arc<StatusBroadcaster>) -> (Self, impl std::future::Future<Output = ()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, forward(rx, broadcaster))
    }

    fn send(&self, update: UiUpdate) {
        if self.tx.send(update).is_err() {
            debug!("UI forwarder stopped; update dropped");
        }
    }
}

impl StateObserver for BroadcastObserver {
    fn state_changed(&self, state: SystemState, armed: bool) {
        self.send(UiUpdate::State { state, armed });
    }

    fn volume_changed(&self, level: f32) {
        self.send(UiUpdate::Volume(level));
    }

    fn alert_logged(&self, alert: &AlertLog) {
        self.send(UiUpdate::Alert(alert.to_entry()));
    }

    fn error_raised(&self, error: &ErrorRecord) {
        self.send(UiUpdate::Error(error.message.clone()));
    }

    fn connection_lost(&self) {
        self.send(UiUpdate::ConnectionLost);
    }

    fn display_changed(&self, silent_mode: bool, blackout: bool) {
        self.send(UiUpdate::Display { silent_mode, blackout });
    }
}

async fn forward(mut rx: mpsc::UnboundedReceiver<UiUpdate>, broadcaster: Arc<StatusBroadcaster>) {
    while let Some(update) = rx.recv().await {
        match update {
            UiUpdate::State { state, armed } => {
                broadcaster.broadcast_state_change(state.as_str(), armed).await
            }
            UiUpdate::Volume(level) => broadcaster.broadcast_volume(level).await,
            UiUpdate::Alert(entry) => broadcaster.add_alert(entry).await,
            UiUpdate::Error(message) => broadcaster.broadcast_error(&message).await,
            UiUpdate::ConnectionLost => broadcaster.broadcast_connection_lost().await,
            UiUpdate::Display { silent_mode, blackout } => {
                broadcaster.broadcast_display_change(silent_mode, blackout).await
            }
        }
    }
}
