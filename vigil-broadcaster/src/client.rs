use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::events::{now_timestamp, AlertEntry, StatusEvent};

/// Snapshot sent to a client right after it connects
#[derive(Debug, Clone, Default)]
pub struct CatchUp {
    pub state: String,
    pub armed: bool,
    pub silent_mode: bool,
    pub blackout: bool,
    /// Most recent first, as stored
    pub alerts: Vec<AlertEntry>,
    pub last_error: Option<String>,
}

/// Client connection wrapper
pub struct Client {
    stream: UnixStream,
}

impl Client {
    pub fn new(stream: UnixStream) -> Self {
        Self { stream }
    }

    pub async fn send_event(&mut self, event: &StatusEvent) -> Result<()> {
        let json_line = event.to_json_line()?;
        self.stream.write_all(json_line.as_bytes()).await?;
        Ok(())
    }

    /// State, display flags, the alert log oldest-first, then any error
    pub async fn send_catch_up(&mut self, catch_up: &CatchUp) -> Result<()> {
        self.send_event(&StatusEvent::StateChange {
            state: catch_up.state.clone(),
            armed: catch_up.armed,
            timestamp: now_timestamp(),
        })
        .await?;

        self.send_event(&StatusEvent::DisplayChange {
            silent_mode: catch_up.silent_mode,
            blackout: catch_up.blackout,
        })
        .await?;

        for alert in catch_up.alerts.iter().rev() {
            self.send_event(&StatusEvent::Alert {
                alert: alert.clone(),
            })
            .await?;
        }

        if let Some(message) = &catch_up.last_error {
            self.send_event(&StatusEvent::Error {
                message: message.clone(),
                timestamp: now_timestamp(),
            })
            .await?;
        }

        Ok(())
    }
}

/// Thread-safe client list manager
pub struct ClientManager {
    clients: Arc<Mutex<Vec<Client>>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self {
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Broadcast event to all clients, removing dead ones
    pub async fn broadcast(&self, event: &StatusEvent) -> Result<()> {
        let mut clients = self.clients.lock().await;
        let mut dead_indices = Vec::new();

        for (idx, client) in clients.iter_mut().enumerate() {
            if let Err(e) = client.send_event(event).await {
                tracing::warn!("Failed to send to client {}: {}", idx, e);
                dead_indices.push(idx);
            }
        }

        for idx in dead_indices.iter().rev() {
            clients.remove(*idx);
            tracing::info!("Removed dead client. Remaining: {}", clients.len());
        }

        Ok(())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub fn clone_arc(&self) -> Arc<Mutex<Vec<Client>>> {
        Arc::clone(&self.clients)
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
