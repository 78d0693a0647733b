//! Live transport session
//!
//! ```text
//! Disconnected ──start()──> Connecting ──Opened──> Connected
//!      ^                        │                      │
//!      └──── stop() / Closed / Errored ────────────────┘
//! ```
//!
//! The session owns the microphone stream and the connection of one arm
//! attempt and reports to its single subscriber through [`SessionEvent`]s.
//! Every `start()`/`stop()` opens a new epoch; work belonging to an older
//! epoch (a slow connect, a late inbound frame) is discarded.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use vigil_audio::{
    encode_pcm16, AudioConfig, AudioError, FrameCallback, MicrophoneProvider, MicrophoneStream,
    VolumeMeter,
};

use crate::client::DEFAULT_MODEL;
use crate::error::{LiveError, Result, SessionFailure};
use crate::protocol::{ClientMessage, DistressTrigger, ServerMessage, Setup};
use crate::transport::{LiveConnection, LiveConnector, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// Everything the session reports to its subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    /// Remote side closed the connection
    Disconnected,
    Error(SessionFailure),
    Trigger(DistressTrigger),
    /// Meter level in [0, 255]
    Volume(f32),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub audio: AudioConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            audio: AudioConfig::default(),
        }
    }
}

/// State shared with the capture thread and the inbound pump
struct Shared {
    state: AtomicU8,
    epoch: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>,
    meter: Mutex<VolumeMeter>,
    events: mpsc::UnboundedSender<SessionEvent>,
    frames_sent: AtomicU64,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.state.swap(state as u8, Ordering::SeqCst))
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("Session subscriber gone");
        }
    }

    fn detach_outbound(&self) {
        self.outbound.lock().take();
    }

    /// Runs on the capture thread for every frame
    fn handle_frame(&self, frame: &[f32]) {
        if self.state() == SessionState::Connected {
            if let Some(outbound) = self.outbound.lock().as_ref() {
                let encoded = encode_pcm16(frame);
                if outbound.send(ClientMessage::audio(&encoded)).is_ok() {
                    self.frames_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    trace!("Audio frame dropped: connection writer gone");
                }
            }
        }

        if let Some(level) = self.meter.lock().sample(frame) {
            self.emit(SessionEvent::Volume(level));
        }
    }

    fn handle_message(&self, message: ServerMessage) {
        if message.setup_complete.is_some() {
            debug!("Detection engine accepted setup");
        }

        if let Some(cancellation) = message.tool_call_cancellation {
            debug!("Engine cancelled tool calls {:?}; alerts already raised stand", cancellation.ids);
        }

        let Some(tool_call) = message.tool_call else {
            return;
        };

        for call in tool_call.function_calls {
            if !call.is_distress() {
                warn!("Ignoring invocation of undeclared tool '{}'", call.name);
                continue;
            }

            let trigger = call.distress_trigger();
            info!(
                "Distress detected: {} ({}, confidence {:?})",
                trigger.reason, trigger.emotion, trigger.confidence
            );
            self.emit(SessionEvent::Trigger(trigger));

            // The acknowledgment goes out regardless of what the subscriber
            // does with the trigger
            let ack = ClientMessage::tool_ack(call.id.clone(), call.name.clone());
            match self.outbound.lock().as_ref() {
                Some(outbound) if outbound.send(ack).is_ok() => {
                    debug!("Acknowledged tool call {}", call.id);
                }
                _ => warn!("Could not acknowledge tool call {}: connection closed", call.id),
            }
        }
    }
}

pub struct LiveSession {
    config: SessionConfig,
    microphone: Arc<dyn MicrophoneProvider>,
    connector: Arc<dyn LiveConnector>,
    shared: Arc<Shared>,
    mic_stream: Mutex<Option<Box<dyn MicrophoneStream>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSession {
    pub fn new(
        config: SessionConfig,
        microphone: Arc<dyn MicrophoneProvider>,
        connector: Arc<dyn LiveConnector>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let meter = VolumeMeter::new(config.audio.fft_size);

        Self {
            config,
            microphone,
            connector,
            shared: Arc::new(Shared {
                state: AtomicU8::new(SessionState::Disconnected as u8),
                epoch: AtomicU64::new(0),
                outbound: Mutex::new(None),
                meter: Mutex::new(meter),
                events,
                frames_sent: AtomicU64::new(0),
            }),
            mic_stream: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Audio frames handed to the connection so far
    pub fn frames_sent(&self) -> u64 {
        self.shared.frames_sent.load(Ordering::Relaxed)
    }

    /// Acquire the microphone and open the connection.
    ///
    /// Any failure is reported once as [`SessionEvent::Error`] and also
    /// returned; whatever this attempt acquired is released first. A
    /// `stop()` issued while starting wins: the attempt quietly unwinds and
    /// returns `Ok`.
    pub async fn start(&self) -> Result<()> {
        let epoch = self.begin()?;
        info!("Starting live session");

        let stream = match self.acquire_microphone().await {
            Ok(stream) => stream,
            Err(e) => return Err(self.abort_start(epoch, e)),
        };

        {
            let mut slot = self.mic_stream.lock();
            if !self.shared.is_current(epoch) {
                drop(slot);
                let mut stream = stream;
                stream.stop();
                debug!("Session stopped while acquiring the microphone");
                return Ok(());
            }
            *slot = Some(stream);
        }

        let connection = match self
            .connector
            .connect(Setup::distress_monitor(&self.config.model))
            .await
        {
            Ok(connection) => connection,
            Err(e) => return Err(self.abort_start(epoch, e)),
        };

        let LiveConnection { outbound, inbound } = connection;
        {
            let mut slot = self.shared.outbound.lock();
            if !self.shared.is_current(epoch) {
                debug!("Session stopped while connecting");
                return Ok(());
            }
            *slot = Some(outbound);
        }

        let pump = tokio::spawn(pump_inbound(Arc::clone(&self.shared), epoch, inbound));
        let mut slot = self.pump.lock();
        if self.shared.is_current(epoch) {
            *slot = Some(pump);
        } else {
            pump.abort();
        }

        Ok(())
    }

    /// Idempotent. Local state flips first so in-flight frame callbacks
    /// stop transmitting, then the connection and microphone are released.
    pub fn stop(&self) {
        let previous = self.shared.set_state(SessionState::Disconnected);
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.detach_outbound();

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        if let Some(mut stream) = self.mic_stream.lock().take() {
            stream.stop();
        }

        if previous != SessionState::Disconnected {
            info!("Live session stopped");
        }
    }

    fn begin(&self) -> Result<u64> {
        self.shared
            .state
            .compare_exchange(
                SessionState::Disconnected as u8,
                SessionState::Connecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| LiveError::AlreadyActive)?;

        Ok(self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn acquire_microphone(&self) -> Result<Box<dyn MicrophoneStream>> {
        let provider = Arc::clone(&self.microphone);
        let config = self.config.audio.clone();
        let shared = Arc::clone(&self.shared);
        let on_frame: FrameCallback = Arc::new(move |frame: Vec<f32>| shared.handle_frame(&frame));

        // Device access may block while the platform decides
        let stream = tokio::task::spawn_blocking(move || provider.acquire(&config, on_frame))
            .await
            .map_err(|e| AudioError::stream(format!("Microphone task failed: {}", e)))??;

        Ok(stream)
    }

    fn abort_start(&self, epoch: u64, err: LiveError) -> LiveError {
        if !self.shared.is_current(epoch) {
            return err;
        }

        if let Some(mut stream) = self.mic_stream.lock().take() {
            stream.stop();
        }
        self.shared.set_state(SessionState::Disconnected);

        let failure = err.failure();
        error!("Live session failed to start: {} ({})", failure, err);
        self.shared.emit(SessionEvent::Error(failure));
        err
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump_inbound(
    shared: Arc<Shared>,
    epoch: u64,
    mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = inbound.recv().await {
        if !shared.is_current(epoch) {
            return;
        }

        match event {
            TransportEvent::Opened => {
                let opened = shared.state.compare_exchange(
                    SessionState::Connecting as u8,
                    SessionState::Connected as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                if opened.is_ok() {
                    info!("Live session connected");
                    shared.emit(SessionEvent::Connected);
                }
            }
            TransportEvent::Message(message) => shared.handle_message(message),
            TransportEvent::Closed { reason } => {
                warn!("Live connection closed: {}", reason.as_deref().unwrap_or("no reason given"));
                shared.set_state(SessionState::Disconnected);
                shared.detach_outbound();
                shared.emit(SessionEvent::Disconnected);
                return;
            }
            TransportEvent::Errored(reason) => {
                error!("Live connection error: {}", reason);
                shared.set_state(SessionState::Disconnected);
                shared.detach_outbound();
                shared.emit(SessionEvent::Error(SessionFailure::connection(reason)));
                return;
            }
        }
    }

    // Connector went away without a close event
    if shared.is_current(epoch) && shared.set_state(SessionState::Disconnected) != SessionState::Disconnected {
        shared.detach_outbound();
        shared.emit(SessionEvent::Disconnected);
    }
}
