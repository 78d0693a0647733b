//! Resource lifecycle guards
//!
//! The controller holds the camera stream and wake lock of the current arm
//! attempt here; the microphone belongs to the live session. Everything is
//! released together on disarm or on any surfaced error.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use vigil_evidence::CameraStream;

use crate::error::GuardError;

#[async_trait]
pub trait WakeLockProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn WakeLock>, GuardError>;
}

/// Held wake lock. Dropping it releases the lock as well.
pub trait WakeLock: Send {
    /// Idempotent
    fn release(&mut self);
}

/// Inhibits idle/sleep for as long as a child process lives
#[derive(Debug, Clone)]
pub struct InhibitorWakeLock {
    command: Vec<String>,
}

impl InhibitorWakeLock {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

pub fn default_inhibit_command() -> Vec<String> {
    [
        "systemd-inhibit",
        "--what=idle:sleep",
        "--who=vigil",
        "--why=Distress monitoring is armed",
        "--mode=block",
        "sleep",
        "infinity",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[async_trait]
impl WakeLockProvider for InhibitorWakeLock {
    async fn acquire(&self) -> Result<Box<dyn WakeLock>, GuardError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| GuardError::Unavailable("no inhibitor command configured".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        // An inhibitor that exits immediately never held anything
        if let Some(status) = child.try_wait()? {
            return Err(GuardError::Unavailable(format!("{} exited with {}", program, status)));
        }

        info!("Wake lock acquired ({})", program);
        Ok(Box::new(InhibitorHandle { child: Some(child) }))
    }
}

struct InhibitorHandle {
    child: Option<Child>,
}

impl WakeLock for InhibitorHandle {
    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                warn!("Failed to stop wake-lock inhibitor: {}", e);
            }
            info!("Wake lock released");
        }
    }
}

impl Drop for InhibitorHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Used when wake locking is turned off in the configuration
#[derive(Debug, Default, Clone)]
pub struct NoWakeLock;

#[async_trait]
impl WakeLockProvider for NoWakeLock {
    async fn acquire(&self) -> Result<Box<dyn WakeLock>, GuardError> {
        debug!("Wake lock disabled");
        Ok(Box::new(NoopLock))
    }
}

struct NoopLock;

impl WakeLock for NoopLock {
    fn release(&mut self) {}
}

/// Resources held by the controller between arm and disarm
#[derive(Default)]
pub struct ResourceGuards {
    camera: Option<Arc<dyn CameraStream>>,
    wake_lock: Option<Box<dyn WakeLock>>,
}

impl ResourceGuards {
    pub fn hold_camera(&mut self, camera: Arc<dyn CameraStream>) {
        if let Some(previous) = self.camera.replace(camera) {
            previous.release();
        }
    }

    pub fn camera(&self) -> Option<Arc<dyn CameraStream>> {
        self.camera.clone()
    }

    pub fn hold_wake_lock(&mut self, lock: Box<dyn WakeLock>) {
        if let Some(mut previous) = self.wake_lock.replace(lock) {
            previous.release();
        }
    }

    pub fn has_wake_lock(&self) -> bool {
        self.wake_lock.is_some()
    }

    pub fn release_wake_lock(&mut self) {
        if let Some(mut lock) = self.wake_lock.take() {
            lock.release();
        }
    }

    pub fn release_all(&mut self) {
        self.release_wake_lock();
        if let Some(camera) = self.camera.take() {
            camera.release();
        }
    }
}

impl Drop for ResourceGuards {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_command_is_unavailable() {
        let provider = InhibitorWakeLock::new(Vec::new());
        assert!(matches!(provider.acquire().await, Err(GuardError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let provider = InhibitorWakeLock::new(vec!["vigil-no-such-inhibitor".to_string()]);
        assert!(matches!(provider.acquire().await, Err(GuardError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_inhibitor_release_is_idempotent() {
        let provider = InhibitorWakeLock::new(vec!["sleep".to_string(), "30".to_string()]);
        let mut lock = provider.acquire().await.unwrap();
        lock.release();
        lock.release();
    }

    #[tokio::test]
    async fn test_guards_release_wake_lock() {
        let mut guards = ResourceGuards::default();
        guards.hold_wake_lock(NoWakeLock.acquire().await.unwrap());
        assert!(guards.has_wake_lock());
        guards.release_all();
        assert!(!guards.has_wake_lock());
        assert!(guards.camera().is_none());
    }
}
