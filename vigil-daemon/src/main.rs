//! Vigil Daemon - distress monitoring service
//!
//! Streams the microphone to the detection service while armed, logs an
//! alert with evidence for every confirmed trigger and notifies the
//! emergency contact. Controlled over a Unix socket (`arm`, `disarm`,
//! `status`, ...); UI clients follow state over a second socket.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vigil_audio::CpalMicrophone;
use vigil_broadcaster::StatusBroadcaster;
use vigil_daemon::config::DaemonConfig;
use vigil_daemon::controller::{AlarmController, Capabilities};
use vigil_daemon::guards::{InhibitorWakeLock, NoWakeLock, WakeLockProvider};
use vigil_daemon::ipc::IpcServer;
use vigil_daemon::notifier::LogNotifier;
use vigil_daemon::observer::BroadcastObserver;
use vigil_evidence::{CommandCamera, FixedLocation, LocationProvider, NoLocation};
use vigil_live::GeminiLiveConnector;

#[derive(Debug, Parser)]
#[command(name = "vigil-daemon", version, about = "Distress monitoring daemon")]
struct Cli {
    /// Configuration file (default: <config dir>/vigil/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Arm immediately after start-up
    #[arg(long)]
    arm: bool,

    /// Start in silent mode regardless of the configuration
    #[arg(long)]
    silent: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_capabilities(config: &DaemonConfig, broadcaster: Arc<StatusBroadcaster>) -> Capabilities {
    let api_key = config.live.resolve_api_key().unwrap_or_else(|| {
        warn!(
            "⚠️ No API key configured; set {} or live.api_key before arming",
            config.live.api_key_env
        );
        String::new()
    });

    let location: Arc<dyn LocationProvider> = match config.evidence.coordinates() {
        Some(coordinates) => {
            info!("📍 Fixed location: {}", coordinates);
            Arc::new(FixedLocation::new(coordinates))
        }
        None => Arc::new(NoLocation),
    };

    let wake_lock: Arc<dyn WakeLockProvider> = if config.wake_lock.enabled {
        Arc::new(InhibitorWakeLock::new(config.wake_lock.command.clone()))
    } else {
        Arc::new(NoWakeLock)
    };

    let (observer, forwarder) = BroadcastObserver::new(broadcaster);
    tokio::spawn(forwarder);

    Capabilities {
        microphone: Arc::new(CpalMicrophone::new()),
        camera: Arc::new(CommandCamera::new(
            &config.evidence.camera_device,
            config.evidence.snapshot_command.clone(),
        )),
        location,
        wake_lock,
        connector: Arc::new(GeminiLiveConnector::new(&config.live.endpoint, api_key)),
        notifier: Arc::new(LogNotifier),
        observer: Arc::new(observer),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    info!("🛡️ Starting Vigil Daemon v{}", env!("CARGO_PKG_VERSION"));

    let mut config = DaemonConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    if cli.silent {
        config.silent_mode = true;
    }

    info!("📋 Configuration loaded from {}", config.config_path.display());
    info!("  - Model: {}", config.live.model);
    info!("  - Audio: {} Hz mono, {} samples per frame", config.audio.sample_rate, config.audio.frame_size);
    info!("  - Camera: {}", config.evidence.camera_device);

    let broadcaster = Arc::new(StatusBroadcaster::new(&config.ui_socket_path));
    broadcaster
        .start()
        .await
        .context("Failed to start status broadcaster")?;

    let controller = AlarmController::new(
        build_capabilities(&config, Arc::clone(&broadcaster)),
        config.controller_settings(),
    );
    controller.set_contact(config.contact.clone());
    controller.set_silent_mode(config.silent_mode);

    if !config.contact.is_complete() {
        warn!(
            "⚠️ No emergency contact configured; add [contact] to {}",
            config.config_path.display()
        );
    }

    let shutdown = Arc::new(Notify::new());
    let ipc_server = IpcServer::new(
        std::path::Path::new(&config.socket_path),
        controller.clone(),
        Arc::clone(&shutdown),
    )
    .context("Failed to start IPC server")?;

    if cli.arm {
        if let Err(e) = controller.arm().await {
            error!("Arming at start-up failed: {}", e);
        }
    }

    info!("🚀 Vigil daemon ready");
    info!("   Send 'arm' or 'disarm' to {}", config.socket_path);

    tokio::select! {
        result = ipc_server.run() => {
            if let Err(e) = result {
                error!("IPC server error: {}", e);
            }
        }
        _ = shutdown.notified() => {
            info!("🛑 Quit requested");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal");
        }
    }

    info!("🧹 Shutting down...");
    controller.disarm();
    drop(ipc_server);
    if let Err(e) = broadcaster.stop().await {
        warn!("Failed to stop status broadcaster: {}", e);
    }
    info!("👋 Vigil daemon stopped");

    Ok(())
}
