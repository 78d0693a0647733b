//! Alert/arming controller
//!
//! ```text
//!          arm()                  Connected              trigger (not silent)
//! IDLE ──────────> CONNECTING ──────────────> ARMED ──────────────────────> DANGER
//!   ^                  │                        │                             │
//!   └──── disarm() / camera, microphone or connection error ─────────────────┘
//! ```
//!
//! The controller owns the live session of the current arm attempt and the
//! resource guards, and reacts to the session's events. Each arm attempt runs
//! under a new generation; events from a torn-down session are dropped, but
//! alerts already being assembled still complete and are logged.
//!
//! Locks are never held across an `.await` or while calling the observer.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use vigil_audio::MicrophoneProvider;
use vigil_evidence::{
    CameraProvider, CameraStream, EvidenceCapture, FacingMode, LocationProvider, JPEG_QUALITY,
    LOCATION_TIMEOUT, SNAPSHOT_TIMEOUT,
};
use vigil_live::{DistressTrigger, LiveConnector, LiveSession, SessionConfig, SessionEvent};

use crate::error::{ControllerError, Result};
use crate::guards::{ResourceGuards, WakeLockProvider};
use crate::notifier::{AlertNotice, Notifier};
use crate::observer::StateObserver;
use crate::state::{AlertLog, EmergencyContact, ErrorRecord, StatusSnapshot, SystemState};

/// Platform capabilities and outward boundaries, injected at construction
#[derive(Clone)]
pub struct Capabilities {
    pub microphone: Arc<dyn MicrophoneProvider>,
    pub camera: Arc<dyn CameraProvider>,
    pub location: Arc<dyn LocationProvider>,
    pub wake_lock: Arc<dyn WakeLockProvider>,
    pub connector: Arc<dyn LiveConnector>,
    pub notifier: Arc<dyn Notifier>,
    pub observer: Arc<dyn StateObserver>,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub session: SessionConfig,
    pub facing: FacingMode,
    pub location_timeout: Duration,
    pub snapshot_timeout: Duration,
    pub jpeg_quality: u8,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            facing: FacingMode::Environment,
            location_timeout: LOCATION_TIMEOUT,
            snapshot_timeout: SNAPSHOT_TIMEOUT,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

struct ControllerState {
    system: SystemState,
    /// Operator asked for monitoring and the session started without error.
    /// ARMED in `system` additionally means the service confirmed the connection.
    armed: bool,
    contact: EmergencyContact,
    silent_mode: bool,
    blackout: bool,
    volume: f32,
    connection_lost: bool,
    /// Most recent first
    alerts: Vec<AlertLog>,
    error: Option<ErrorRecord>,
    guards: ResourceGuards,
}

struct Inner {
    caps: Capabilities,
    settings: ControllerSettings,
    evidence: EvidenceCapture,
    state: Mutex<ControllerState>,
    session: Mutex<Option<Arc<LiveSession>>>,
    /// Only changed with `state` locked
    generation: AtomicU64,
}

/// What the asynchronous half of the alert pipeline needs
struct PendingAlert {
    trigger: DistressTrigger,
    silent: bool,
    contact: EmergencyContact,
    camera: Option<Arc<dyn CameraStream>>,
}

#[derive(Clone)]
pub struct AlarmController {
    inner: Arc<Inner>,
}

impl AlarmController {
    pub fn new(caps: Capabilities, settings: ControllerSettings) -> Self {
        let evidence = EvidenceCapture::new(Arc::clone(&caps.location))
            .with_location_timeout(settings.location_timeout)
            .with_snapshot_timeout(settings.snapshot_timeout)
            .with_jpeg_quality(settings.jpeg_quality);

        Self {
            inner: Arc::new(Inner {
                caps,
                settings,
                evidence,
                state: Mutex::new(ControllerState {
                    system: SystemState::Idle,
                    armed: false,
                    contact: EmergencyContact::default(),
                    silent_mode: false,
                    blackout: false,
                    volume: 0.0,
                    connection_lost: false,
                    alerts: Vec::new(),
                    error: None,
                    guards: ResourceGuards::default(),
                }),
                session: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    fn observer(&self) -> &dyn StateObserver {
        self.inner.caps.observer.as_ref()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    pub fn state(&self) -> SystemState {
        self.inner.state.lock().system
    }

    pub fn is_armed(&self) -> bool {
        self.inner.state.lock().armed
    }

    pub fn volume(&self) -> f32 {
        self.inner.state.lock().volume
    }

    /// Most recent first
    pub fn alerts(&self) -> Vec<AlertLog> {
        self.inner.state.lock().alerts.clone()
    }

    pub fn last_error(&self) -> Option<ErrorRecord> {
        self.inner.state.lock().error.clone()
    }

    pub fn contact(&self) -> EmergencyContact {
        self.inner.state.lock().contact.clone()
    }

    pub fn set_contact(&self, contact: EmergencyContact) {
        self.inner.state.lock().contact = contact;
    }

    pub fn silent_mode(&self) -> bool {
        self.inner.state.lock().silent_mode
    }

    pub fn blackout(&self) -> bool {
        self.inner.state.lock().blackout
    }

    pub fn has_wake_lock(&self) -> bool {
        self.inner.state.lock().guards.has_wake_lock()
    }

    pub fn set_silent_mode(&self, enabled: bool) {
        let blackout = {
            let mut st = self.inner.state.lock();
            st.silent_mode = enabled;
            st.blackout
        };
        info!("Silent mode {}", if enabled { "on" } else { "off" });
        self.observer().display_changed(enabled, blackout);
    }

    /// Display-only; a visible trigger turns it off again
    pub fn set_blackout(&self, enabled: bool) {
        let silent_mode = {
            let mut st = self.inner.state.lock();
            st.blackout = enabled;
            st.silent_mode
        };
        debug!("Blackout {}", if enabled { "on" } else { "off" });
        self.observer().display_changed(silent_mode, enabled);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let st = self.inner.state.lock();
        StatusSnapshot {
            state: st.system,
            armed: st.armed,
            silent_mode: st.silent_mode,
            blackout: st.blackout,
            volume: st.volume,
            connection_lost: st.connection_lost,
            alert_count: st.alerts.len(),
            contact: st.contact.clone(),
            error: st.error.clone(),
        }
    }

    /// Start monitoring.
    ///
    /// Rejected without touching any device when the contact is incomplete or
    /// a previous attempt is still active. A failure while acquiring the
    /// camera, the microphone or the connection returns the controller to
    /// IDLE with the error recorded. A `disarm()` issued meanwhile wins: the
    /// attempt unwinds quietly and returns `Ok` unless a device had already
    /// failed.
    pub async fn arm(&self) -> Result<()> {
        let generation = self.begin_arm()?;

        let camera = match self.inner.caps.camera.acquire(self.inner.settings.facing).await {
            Ok(camera) => camera,
            Err(e) => {
                warn!("Camera acquisition failed: {}", e);
                let err = ControllerError::from_camera(&e);
                self.fail(generation, &err);
                return Err(err);
            }
        };

        {
            let mut st = self.inner.state.lock();
            if !self.is_current(generation) {
                drop(st);
                camera.release();
                debug!("Arming cancelled while acquiring the camera");
                return Ok(());
            }
            st.guards.hold_camera(camera);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Arc::new(LiveSession::new(
            self.inner.settings.session.clone(),
            Arc::clone(&self.inner.caps.microphone),
            Arc::clone(&self.inner.caps.connector),
            events_tx,
        ));

        {
            let _st = self.inner.state.lock();
            if !self.is_current(generation) {
                debug!("Arming cancelled before the session started");
                return Ok(());
            }
            *self.inner.session.lock() = Some(Arc::clone(&session));
        }

        tokio::spawn(self.clone().pump_session(generation, events_rx));

        // The session also reports this as an event; whichever arrives
        // first is applied
        if let Err(e) = session.start().await {
            let err = ControllerError::from(&e);
            self.fail(generation, &err);
            return Err(err);
        }

        let state = {
            let mut st = self.inner.state.lock();
            if !self.is_current(generation) {
                return Ok(());
            }
            st.armed = true;
            st.system
        };
        info!("Monitoring requested; waiting for the detection service");
        self.observer().state_changed(state, true);
        Ok(())
    }

    fn begin_arm(&self) -> Result<u64> {
        let mut st = self.inner.state.lock();

        if st.system.is_active() {
            warn!("Arm requested while {}", st.system);
            return Err(ControllerError::AlreadyArmed);
        }

        if !st.contact.is_complete() {
            let err = ControllerError::setup();
            let record = ErrorRecord::new(err.to_string());
            st.error = Some(record.clone());
            drop(st);

            warn!("Arming refused: {}", err);
            self.observer().error_raised(&record);
            return Err(err);
        }

        st.system = SystemState::Connecting;
        st.armed = false;
        st.error = None;
        st.connection_lost = false;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("🛡️ Arming (emergency contact: {})", st.contact.name);
        drop(st);

        self.observer().state_changed(SystemState::Connecting, false);
        Ok(generation)
    }

    /// Idempotent. Local state flips immediately; the session and guards are
    /// released right after.
    pub fn disarm(&self) {
        let (session, previous, blackout_was, silent_mode) = {
            let mut st = self.inner.state.lock();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            st.guards.release_all();

            let previous = st.system;
            let blackout_was = st.blackout;
            st.system = SystemState::Idle;
            st.armed = false;
            st.volume = 0.0;
            st.blackout = false;
            st.connection_lost = false;

            (self.inner.session.lock().take(), previous, blackout_was, st.silent_mode)
        };

        if let Some(session) = session {
            session.stop();
        }

        if previous.is_active() {
            info!("🛑 Disarmed (was {})", previous);
            self.observer().state_changed(SystemState::Idle, false);
            self.observer().volume_changed(0.0);
        } else {
            debug!("Disarm requested while idle");
        }
        if blackout_was {
            self.observer().display_changed(silent_mode, false);
        }
    }

    /// Unified error path: record the error and return to a disarmed rest
    /// state. Returns false when `generation` is no longer current.
    fn fail(&self, generation: u64, err: &ControllerError) -> bool {
        let record = ErrorRecord::new(err.to_string());

        let session = {
            let mut st = self.inner.state.lock();
            if !self.is_current(generation) {
                debug!("Ignoring error from a previous arm attempt: {}", err);
                return false;
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            st.guards.release_all();

            st.system = SystemState::Idle;
            st.armed = false;
            st.volume = 0.0;
            st.connection_lost = false;
            st.error = Some(record.clone());

            self.inner.session.lock().take()
        };

        if let Some(session) = session {
            session.stop();
        }

        error!("❌ {}", record.message);
        self.observer().state_changed(SystemState::Idle, false);
        self.observer().volume_changed(0.0);
        self.observer().error_raised(&record);
        true
    }

    async fn pump_session(self, generation: u64, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            if !self.is_current(generation) {
                trace!("Session events from generation {} dropped", generation);
                return;
            }

            match event {
                SessionEvent::Connected => self.on_connected(generation),
                SessionEvent::Disconnected => self.on_disconnected(generation),
                SessionEvent::Error(failure) => {
                    self.fail(generation, &ControllerError::from_failure(&failure));
                }
                SessionEvent::Trigger(trigger) => {
                    let pending = self.begin_alert(trigger);
                    let controller = self.clone();
                    tokio::spawn(async move { controller.complete_alert(pending).await });
                }
                SessionEvent::Volume(level) => self.on_volume(generation, level),
            }
        }
    }

    fn on_connected(&self, generation: u64) {
        let armed = {
            let mut st = self.inner.state.lock();
            if !self.is_current(generation) || st.system != SystemState::Connecting {
                return;
            }
            st.system = SystemState::Armed;
            st.armed
        };
        info!("✅ Armed: listening for distress");
        self.observer().state_changed(SystemState::Armed, armed);

        // Off the pump so a slow inhibitor cannot hold back triggers
        let controller = self.clone();
        tokio::spawn(async move { controller.acquire_wake_lock(generation).await });
    }

    async fn acquire_wake_lock(&self, generation: u64) {
        match self.inner.caps.wake_lock.acquire().await {
            Ok(mut wake_lock) => {
                let mut st = self.inner.state.lock();
                if self.is_current(generation) {
                    st.guards.hold_wake_lock(wake_lock);
                } else {
                    drop(st);
                    debug!("Wake lock arrived after disarm; releasing");
                    wake_lock.release();
                }
            }
            Err(e) => warn!("Continuing without a wake lock: {}", e),
        }
    }

    /// The service hung up while armed. The state stays as it is; the
    /// operator is told and has to disarm and re-arm.
    fn on_disconnected(&self, generation: u64) {
        {
            let mut st = self.inner.state.lock();
            if !self.is_current(generation) {
                return;
            }
            st.connection_lost = true;
            st.volume = 0.0;
        }
        warn!("⚠️ Detection service disconnected; monitoring has stopped until re-armed");
        self.observer().connection_lost();
        self.observer().volume_changed(0.0);
    }

    fn on_volume(&self, generation: u64, level: f32) {
        {
            let mut st = self.inner.state.lock();
            // Meter stays at rest once the service is gone
            if !self.is_current(generation) || st.connection_lost {
                return;
            }
            st.volume = level;
        }
        self.observer().volume_changed(level);
    }

    /// Synchronous half of the alert pipeline: raise the visible alarm
    fn begin_alert(&self, trigger: DistressTrigger) -> PendingAlert {
        let mut entered_danger = None;
        let mut display = None;

        let pending = {
            let mut st = self.inner.state.lock();
            let silent = st.silent_mode;

            if !silent {
                if st.system == SystemState::Armed {
                    st.system = SystemState::Danger;
                    entered_danger = Some(st.armed);
                }
                if st.blackout {
                    st.blackout = false;
                    display = Some(st.silent_mode);
                }
            }

            PendingAlert {
                trigger,
                silent,
                contact: st.contact.clone(),
                camera: st.guards.camera(),
            }
        };

        warn!(
            "🚨 Distress: {} [{}]{}",
            pending.trigger.reason,
            pending.trigger.emotion,
            if pending.silent { " (silent)" } else { "" }
        );

        if let Some(armed) = entered_danger {
            self.observer().state_changed(SystemState::Danger, armed);
        }
        if let Some(silent_mode) = display {
            self.observer().display_changed(silent_mode, false);
        }
        pending
    }

    /// Evidence, log entry and notification. Runs to completion even if the
    /// session goes away meanwhile.
    async fn complete_alert(&self, pending: PendingAlert) {
        let PendingAlert {
            trigger,
            silent,
            contact,
            camera,
        } = pending;

        let evidence = self.inner.evidence.capture(camera).await;
        let alert = AlertLog::new(&trigger, evidence, silent);

        let total = {
            let mut st = self.inner.state.lock();
            st.alerts.insert(0, alert.clone());
            st.alerts.len()
        };
        info!(
            "Alert {} logged at {} ({} this session)",
            alert.id, alert.location, total
        );
        self.observer().alert_logged(&alert);

        let notice = AlertNotice::new(&contact, &alert);
        if let Err(e) = self.inner.caps.notifier.dispatch(&notice).await {
            error!("{}", e);
        }
    }
}
