use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::client::{CatchUp, Client, ClientManager};
use crate::error::{BroadcasterError, Result};
use crate::events::{now_timestamp, AlertEntry, StatusEvent};

/// Status broadcaster for UI clients
pub struct StatusBroadcaster {
    socket_path: PathBuf,
    client_manager: ClientManager,
    snapshot: Arc<RwLock<CatchUp>>,
    accept_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    running: Arc<RwLock<bool>>,
}

impl StatusBroadcaster {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            client_manager: ClientManager::new(),
            snapshot: Arc::new(RwLock::new(CatchUp {
                state: "idle".to_string(),
                ..Default::default()
            })),
            accept_task: Arc::new(Mutex::new(None)),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start listening for clients
    pub async fn start(&self) -> Result<()> {
        if *self.running.read().await {
            return Err(BroadcasterError::AlreadyRunning);
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if self.socket_path.exists() {
                std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
            }
        }

        tracing::info!("Status broadcaster started on {:?} (permissions: 0600)", self.socket_path);

        *self.running.write().await = true;

        let clients = self.client_manager.clone_arc();
        let snapshot = Arc::clone(&self.snapshot);
        let running = Arc::clone(&self.running);

        let task = tokio::spawn(async move {
            loop {
                if !*running.read().await {
                    break;
                }

                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let mut client = Client::new(stream);

                        // Hold the client list so no event slips between the
                        // catch-up and registration
                        let mut clients = clients.lock().await;
                        let catch_up = snapshot.read().await.clone();
                        if let Err(e) = client.send_catch_up(&catch_up).await {
                            tracing::warn!("Failed to send catch-up data: {}", e);
                            continue;
                        }

                        clients.push(client);
                        tracing::info!("UI client connected. Total: {}", clients.len());
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept client: {}", e);
                    }
                }
            }
            tracing::info!("Client acceptance task stopped");
        });

        *self.accept_task.lock().await = Some(task);

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if !*self.running.read().await {
            return Err(BroadcasterError::NotStarted);
        }

        *self.running.write().await = false;

        if let Some(task) = self.accept_task.lock().await.take() {
            task.abort();
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        tracing::info!("Status broadcaster stopped");
        Ok(())
    }

    pub async fn broadcast_state_change(&self, state: &str, armed: bool) {
        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.state = state.to_string();
            snapshot.armed = armed;
            if state != "idle" {
                snapshot.last_error = None;
            }
        }

        self.send(StatusEvent::StateChange {
            state: state.to_string(),
            armed,
            timestamp: now_timestamp(),
        })
        .await;
    }

    /// Not part of the catch-up; levels are stale by the time anyone connects
    pub async fn broadcast_volume(&self, level: f32) {
        self.send(StatusEvent::Volume { level }).await;
    }

    /// Prepend to the alert log and broadcast
    pub async fn add_alert(&self, alert: AlertEntry) {
        self.snapshot.write().await.alerts.insert(0, alert.clone());
        self.send(StatusEvent::Alert { alert }).await;
    }

    pub async fn broadcast_error(&self, message: &str) {
        self.snapshot.write().await.last_error = Some(message.to_string());
        self.send(StatusEvent::Error {
            message: message.to_string(),
            timestamp: now_timestamp(),
        })
        .await;
    }

    pub async fn broadcast_connection_lost(&self) {
        self.send(StatusEvent::ConnectionLost {
            timestamp: now_timestamp(),
        })
        .await;
    }

    pub async fn broadcast_display_change(&self, silent_mode: bool, blackout: bool) {
        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.silent_mode = silent_mode;
            snapshot.blackout = blackout;
        }
        self.send(StatusEvent::DisplayChange {
            silent_mode,
            blackout,
        })
        .await;
    }

    pub async fn client_count(&self) -> usize {
        self.client_manager.client_count().await
    }

    pub async fn alert_count(&self) -> usize {
        self.snapshot.read().await.alerts.len()
    }

    async fn send(&self, event: StatusEvent) {
        if let Err(e) = self.client_manager.broadcast(&event).await {
            tracing::error!("Failed to broadcast {:?}: {}", event, e);
        }
    }
}

impl Drop for StatusBroadcaster {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
