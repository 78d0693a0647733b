//! Unix socket control server
//!
//! One line command per connection, one line of response.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::controller::AlarmController;

/// IPC command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcCommand {
    Arm,
    Disarm,
    Status,
    Alerts,
    Silent(bool),
    Blackout(bool),
    Quit,
}

impl IpcCommand {
    pub fn parse(s: &str) -> Result<Self> {
        let line = s.trim().to_lowercase();
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let argument = words.next();

        if words.next().is_some() {
            anyhow::bail!("Too many arguments: {}", s.trim());
        }

        match (command, argument) {
            ("arm", None) => Ok(Self::Arm),
            ("disarm", None) => Ok(Self::Disarm),
            ("status", None) => Ok(Self::Status),
            ("alerts", None) => Ok(Self::Alerts),
            ("silent", Some(arg)) => Ok(Self::Silent(parse_switch(arg)?)),
            ("blackout", Some(arg)) => Ok(Self::Blackout(parse_switch(arg)?)),
            ("quit" | "exit" | "shutdown", None) => Ok(Self::Quit),
            _ => anyhow::bail!("Unknown command: {}", s.trim()),
        }
    }
}

fn parse_switch(arg: &str) -> Result<bool> {
    match arg {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => anyhow::bail!("Expected 'on' or 'off', got '{}'", arg),
    }
}

/// Unix socket IPC server
pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
    controller: AlarmController,
    shutdown: Arc<Notify>,
}

impl IpcServer {
    /// Bind the control socket; `quit` notifies `shutdown`
    pub fn new(socket_path: &Path, controller: AlarmController, shutdown: Arc<Notify>) -> Result<Self> {
        // Remove a stale socket from a previous run
        let _ = std::fs::remove_file(socket_path);

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind {}", socket_path.display()))?;
        vigil_paths::secure_socket_permissions(socket_path)?;

        info!("IPC server listening on {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            controller,
            shutdown,
        })
    }

    /// Accept connections until the task is dropped
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, _) = self
                .listener
                .accept()
                .await
                .context("Failed to accept connection")?;

            let controller = self.controller.clone();
            let shutdown = Arc::clone(&self.shutdown);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, controller, shutdown).await {
                    error!("IPC connection error: {}", e);
                }
            });
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Handle a single IPC connection
pub async fn handle_connection(
    stream: UnixStream,
    controller: AlarmController,
    shutdown: Arc<Notify>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut request = String::new();
    let n = BufReader::new(reader).read_line(&mut request).await?;

    if n == 0 {
        return Ok(());
    }

    debug!("Received IPC command: {}", request.trim());

    let response = match IpcCommand::parse(&request) {
        Ok(command) => execute(command, &controller, &shutdown).await,
        Err(e) => format!("Error: {}", e),
    };

    writer.write_all(response.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

/// Run one command against the controller and render the response line
pub async fn execute(command: IpcCommand, controller: &AlarmController, shutdown: &Notify) -> String {
    match command {
        IpcCommand::Arm => match controller.arm().await {
            Ok(()) => format!("Arming ({})", controller.state()),
            Err(e) => format!("Error: {}", e),
        },
        IpcCommand::Disarm => {
            controller.disarm();
            "Disarmed".to_string()
        }
        IpcCommand::Status => to_json_line(&controller.snapshot()),
        IpcCommand::Alerts => to_json_line(&controller.alerts()),
        IpcCommand::Silent(enabled) => {
            controller.set_silent_mode(enabled);
            format!("Silent mode {}", if enabled { "on" } else { "off" })
        }
        IpcCommand::Blackout(enabled) => {
            controller.set_blackout(enabled);
            format!("Blackout {}", if enabled { "on" } else { "off" })
        }
        IpcCommand::Quit => {
            info!("Received quit command");
            shutdown.notify_one();
            "Shutting down".to_string()
        }
    }
}

fn to_json_line<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("Error: {}", e))
}
