//! Arming controller against fake capabilities


use std::sync::Arc;
use std::time::Duration;

use test_helpers::*;
use vigil_audio::AudioError;
use vigil_daemon::error::SETUP_MESSAGE;
use vigil_daemon::{ControllerError, ControllerSettings, EmergencyContact, SystemState};
use vigil_evidence::{EvidenceError, FixedLocation, NoLocation, UNKNOWN_LOCATION};
use vigil_live::{ClientMessage, Emotion, ALERTS_SENT};

#[tokio::test]
async fn test_empty_contact_fails_before_any_acquisition() {
    let h = Harness::new();
    h.controller.set_contact(EmergencyContact::new("", "+15550123"));

    let result = h.controller.arm().await;

    assert!(matches!(result, Err(ControllerError::SetupValidation(_))));
    assert_eq!(h.controller.state(), SystemState::Idle);
    assert_eq!(h.controller.last_error().unwrap().message, SETUP_MESSAGE);
    assert_eq!(h.camera.acquisitions(), 0);
    assert_eq!(h.mic.acquisitions(), 0);
    assert_eq!(h.connector.connects(), 0);
    assert!(h.observer.saw(&Observed::Error(SETUP_MESSAGE.to_string())));
}

#[tokio::test]
async fn test_arm_reaches_armed_with_wake_lock() {
    let h = Harness::new();

    h.controller.arm().await.unwrap();
    eventually(|| h.controller.state() == SystemState::Armed).await;
    eventually(|| h.controller.has_wake_lock()).await;

    assert!(h.controller.is_armed());
    assert!(h.wake_lock.is_held());
    assert!(h.controller.last_error().is_none());
    assert_eq!(h.camera.acquisitions(), 1);
    assert_eq!(h.mic.acquisitions(), 1);

    let states = h.observer.states();
    assert_eq!(states.first(), Some(&SystemState::Connecting));
    assert!(states.contains(&SystemState::Armed));
}

#[tokio::test]
async fn test_armed_state_waits_for_connection() {
    let h = Harness::build(FakeMicrophone::new(), FakeConnector::manual(), FakeCamera::new());

    h.controller.arm().await.unwrap();

    // Requested, but the service has not confirmed yet
    assert!(h.controller.is_armed());
    assert_eq!(h.controller.state(), SystemState::Connecting);
    assert_eq!(h.wake_lock.acquisitions(), 0);

    let remote = h.connector.take_remote();
    remote.open();
    eventually(|| h.controller.state() == SystemState::Armed).await;
    eventually(|| h.wake_lock.is_held()).await;
}

#[tokio::test]
async fn test_trigger_enters_danger_logs_alert_and_acknowledges() {
    let h = Harness::new();
    let mut remote = h.arm_connected().await;

    remote.invoke_distress("call-1", "chaotic scream", "MORTAL_FEAR", 0.97);
    eventually(|| h.controller.alerts().len() == 1).await;

    assert_eq!(h.controller.state(), SystemState::Danger);
    assert!(h.controller.is_armed());

    let alert = &h.controller.alerts()[0];
    assert_eq!(alert.emotion, Emotion::MortalFear);
    assert_eq!(alert.reason, "chaotic scream");
    assert_eq!(alert.call_id, "call-1");
    assert_eq!(alert.confidence, Some(0.97));
    assert!(!alert.is_silent);
    assert_eq!(alert.location, "52.520000, 13.405000");
    assert!(alert
        .image_url
        .as_deref()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));

    assert_eq!(
        remote.drain_acks(),
        vec![("call-1".to_string(), ALERTS_SENT.to_string())]
    );

    eventually(|| h.notifier.notices().len() == 1).await;
    let notice = &h.notifier.notices()[0];
    assert_eq!(notice.contact_name, "Mom");
    assert_eq!(notice.contact_phone, "+15550123");
    assert_eq!(notice.emotion, Emotion::MortalFear);
    assert!(!notice.silent);
    assert!(notice.has_image);
}

#[tokio::test]
async fn test_silent_trigger_keeps_armed_and_blackout() {
    let h = Harness::new();
    h.controller.set_silent_mode(true);
    h.controller.set_blackout(true);
    let remote = h.arm_connected().await;

    remote.invoke_distress("call-1", "muffled cry", "COERCION", 0.96);
    eventually(|| h.notifier.notices().len() == 1).await;

    assert_eq!(h.controller.state(), SystemState::Armed);
    assert!(h.controller.blackout());
    assert!(h.controller.alerts()[0].is_silent);
    assert!(h.notifier.notices()[0].silent);
    assert!(!h.observer.states().contains(&SystemState::Danger));
}

#[tokio::test]
async fn test_visible_trigger_turns_blackout_off() {
    let h = Harness::new();
    h.controller.set_blackout(true);
    let remote = h.arm_connected().await;

    remote.invoke_distress("call-1", "scream", "PANIC_ATTACK", 0.99);
    eventually(|| h.controller.alerts().len() == 1).await;

    assert!(!h.controller.blackout());
    assert!(h.observer.saw(&Observed::Display {
        silent_mode: false,
        blackout: false
    }));
}

#[tokio::test]
async fn test_every_invocation_is_logged_and_acknowledged() {
    let h = Harness::new();
    let mut remote = h.arm_connected().await;

    // The core never gates on confidence
    remote.invoke_distress("a", "first", "MORTAL_FEAR", 0.97);
    remote.invoke_distress("b", "second", "PANIC_ATTACK", 0.5);
    remote.invoke_distress("c", "third", "SOMETHING_ELSE", 0.99);
    eventually(|| h.controller.alerts().len() == 3).await;
    eventually(|| h.notifier.notices().len() == 3).await;

    let mut acked: Vec<String> = remote.drain_acks().into_iter().map(|(id, _)| id).collect();
    acked.sort();
    assert_eq!(acked, vec!["a", "b", "c"]);

    let emotions: Vec<Emotion> = h.controller.alerts().iter().map(|a| a.emotion).collect();
    assert!(emotions.contains(&Emotion::Unknown));
}

#[tokio::test]
async fn test_camera_denied_aborts_before_microphone() {
    let h = Harness::build(
        FakeMicrophone::new(),
        FakeConnector::new(),
        FakeCamera::failing(EvidenceError::PermissionDenied("/dev/video0".into())),
    );

    let result = h.controller.arm().await;

    assert!(matches!(result, Err(ControllerError::PermissionDenied(_))));
    assert_eq!(h.controller.state(), SystemState::Idle);
    assert!(!h.controller.is_armed());
    assert!(h
        .controller
        .last_error()
        .unwrap()
        .message
        .starts_with("Camera access was denied"));
    assert_eq!(h.mic.acquisitions(), 0);
    assert_eq!(h.connector.connects(), 0);
}

#[tokio::test]
async fn test_microphone_denied_releases_camera() {
    let h = Harness::build(
        FakeMicrophone::failing(AudioError::PermissionDenied("blocked".into())),
        FakeConnector::new(),
        FakeCamera::new(),
    );

    let result = h.controller.arm().await;

    assert!(matches!(result, Err(ControllerError::PermissionDenied(_))));
    assert_eq!(h.controller.state(), SystemState::Idle);
    assert!(h
        .controller
        .last_error()
        .unwrap()
        .message
        .starts_with("Microphone access was denied"));
    assert_eq!(h.camera.releases(), 1);
    assert_eq!(h.connector.connects(), 0);
    assert!(!h.wake_lock.is_held());
}

#[tokio::test]
async fn test_connection_failure_releases_microphone_and_camera() {
    let h = Harness::build(
        FakeMicrophone::new(),
        FakeConnector::failing("dns lookup failed"),
        FakeCamera::new(),
    );

    let result = h.controller.arm().await;

    assert!(matches!(result, Err(ControllerError::Connection(_))));
    assert_eq!(h.controller.state(), SystemState::Idle);
    assert_eq!(h.mic.stops(), 1);
    assert_eq!(h.camera.releases(), 1);

    // Reported once even though the session also emitted it as an event
    tokio::time::sleep(Duration::from_millis(20)).await;
    let errors = h
        .observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, Observed::Error(_)))
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn test_mid_session_error_returns_to_idle() {
    let h = Harness::new();
    let remote = h.arm_connected().await;
    eventually(|| h.wake_lock.is_held()).await;

    remote.error("connection reset by peer");
    eventually(|| h.controller.state() == SystemState::Idle).await;

    assert!(!h.controller.is_armed());
    assert!(!h.wake_lock.is_held());
    assert_eq!(h.mic.stops(), 1);
    assert_eq!(h.camera.releases(), 1);
    assert!(h
        .controller
        .last_error()
        .unwrap()
        .message
        .contains("connection reset by peer"));
}

#[tokio::test]
async fn test_remote_close_keeps_state_and_reports() {
    let h = Harness::new();
    let remote = h.arm_connected().await;
    eventually(|| h.wake_lock.is_held()).await;

    remote.close();
    eventually(|| h.observer.saw(&Observed::ConnectionLost)).await;

    assert_eq!(h.controller.state(), SystemState::Armed);
    assert!(h.controller.is_armed());
    assert!(h.controller.snapshot().connection_lost);
    assert!(h.wake_lock.is_held());

    h.controller.disarm();
    assert!(!h.controller.snapshot().connection_lost);
}

#[tokio::test]
async fn test_meter_stays_at_rest_after_remote_close() {
    let h = Harness::new();
    let remote = h.arm_connected().await;

    assert!(h.mic.push_frame(tone_frame()));
    eventually(|| h.controller.volume() > 0.0).await;

    remote.close();
    eventually(|| h.controller.snapshot().connection_lost).await;
    assert_eq!(h.controller.volume(), 0.0);

    // The microphone is still running and keeps metering
    assert!(h.mic.push_frame(tone_frame()));
    assert!(h.mic.push_frame(tone_frame()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.controller.volume(), 0.0);
    let events = h.observer.events();
    let lost_at = events
        .iter()
        .position(|e| *e == Observed::ConnectionLost)
        .unwrap();
    assert!(events[lost_at..]
        .iter()
        .all(|e| !matches!(e, Observed::Volume(level) if *level > 0.0)));
}

#[tokio::test]
async fn test_slow_wake_lock_does_not_delay_triggers() {
    let h = Harness::new();
    h.wake_lock.stall();
    let remote = h.arm_connected().await;

    remote.invoke_distress("call-1", "help me", "MORTAL_FEAR", 0.98);
    eventually(|| h.notifier.notices().len() == 1).await;

    assert_eq!(h.controller.state(), SystemState::Danger);
    assert!(!h.wake_lock.is_held());

    h.wake_lock.unstall();
    eventually(|| h.controller.has_wake_lock()).await;
}

#[tokio::test]
async fn test_wake_lock_granted_after_disarm_is_released() {
    let h = Harness::new();
    h.wake_lock.stall();
    let _remote = h.arm_connected().await;

    h.controller.disarm();
    h.wake_lock.unstall();

    eventually(|| h.wake_lock.acquisitions() == 1).await;
    eventually(|| !h.wake_lock.is_held()).await;
    assert!(!h.controller.has_wake_lock());
}

#[tokio::test]
async fn test_disarm_releases_everything_and_is_idempotent() {
    let h = Harness::new();
    let mut remote = h.arm_connected().await;
    eventually(|| h.wake_lock.is_held()).await;

    assert!(h.mic.push_frame(tone_frame()));
    eventually(|| h.controller.volume() > 0.0).await;
    remote.drain();

    h.controller.disarm();
    assert_eq!(h.controller.state(), SystemState::Idle);
    assert_eq!(h.controller.volume(), 0.0);
    assert!(!h.controller.is_armed());
    assert!(!h.wake_lock.is_held());
    assert_eq!(h.mic.stops(), 1);
    assert_eq!(h.camera.releases(), 1);

    h.controller.disarm();
    assert_eq!(h.controller.state(), SystemState::Idle);
    assert_eq!(h.mic.stops(), 1);

    // A frame racing the teardown goes nowhere
    h.mic.push_frame(tone_frame());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!remote
        .drain()
        .iter()
        .any(|m| matches!(m, ClientMessage::RealtimeInput(_))));
    assert_eq!(h.controller.volume(), 0.0);
}

#[tokio::test]
async fn test_disarm_when_never_armed() {
    let h = Harness::new();
    h.controller.disarm();
    h.controller.disarm();
    assert_eq!(h.controller.state(), SystemState::Idle);
    assert!(h.observer.events().is_empty());
}

#[tokio::test]
async fn test_double_arm_is_rejected() {
    let h = Harness::new();
    let _remote = h.arm_connected().await;

    let result = h.controller.arm().await;

    assert_eq!(result, Err(ControllerError::AlreadyArmed));
    assert_eq!(h.controller.state(), SystemState::Armed);
    assert_eq!(h.camera.acquisitions(), 1);
    assert_eq!(h.connector.connects(), 1);
}

#[tokio::test]
async fn test_rearm_after_disarm() {
    let h = Harness::new();
    let _first = h.arm_connected().await;
    h.controller.disarm();

    let _second = h.arm_connected().await;
    assert_eq!(h.camera.acquisitions(), 2);
    assert_eq!(h.connector.connects(), 2);
    eventually(|| h.wake_lock.is_held()).await;
}

#[tokio::test]
async fn test_events_from_stopped_session_are_ignored() {
    let h = Harness::build(FakeMicrophone::new(), FakeConnector::manual(), FakeCamera::new());
    h.controller.arm().await.unwrap();
    let remote = h.connector.take_remote();

    h.controller.disarm();
    remote.open();
    remote.invoke_distress("late", "too late", "MORTAL_FEAR", 0.99);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.controller.state(), SystemState::Idle);
    assert_eq!(h.wake_lock.acquisitions(), 0);
    assert!(h.controller.alerts().is_empty());
}

#[tokio::test]
async fn test_disarm_during_camera_acquisition_cancels_arming() {
    let h = Harness::build(
        FakeMicrophone::new(),
        FakeConnector::new(),
        FakeCamera::slow(Duration::from_millis(50)),
    );

    let controller = h.controller.clone();
    let arming = tokio::spawn(async move { controller.arm().await });
    eventually(|| h.camera.acquisitions() == 1).await;

    h.controller.disarm();
    assert!(arming.await.unwrap().is_ok());

    assert_eq!(h.controller.state(), SystemState::Idle);
    assert_eq!(h.camera.releases(), 1);
    assert_eq!(h.mic.acquisitions(), 0);
    assert_eq!(h.connector.connects(), 0);
}

#[tokio::test]
async fn test_alert_in_flight_completes_after_disarm() {
    let h = Harness::with_location(
        FakeMicrophone::new(),
        FakeConnector::new(),
        FakeCamera::new(),
        Arc::new(SlowLocation(Duration::from_millis(100))),
    );
    let remote = h.arm_connected().await;

    remote.invoke_distress("call-1", "scream", "MORTAL_FEAR", 0.98);
    eventually(|| h.controller.state() == SystemState::Danger).await;
    h.controller.disarm();

    eventually(|| h.notifier.notices().len() == 1).await;
    assert_eq!(h.controller.alerts().len(), 1);
    assert_eq!(h.controller.state(), SystemState::Idle);
}

#[tokio::test]
async fn test_evidence_failures_still_log_and_dispatch() {
    let h = Harness::with_location(
        FakeMicrophone::new(),
        FakeConnector::new(),
        FakeCamera::broken_feed(),
        Arc::new(NoLocation),
    );
    let remote = h.arm_connected().await;

    remote.invoke_distress("call-1", "scream", "PANIC_ATTACK", 0.97);
    eventually(|| h.notifier.notices().len() == 1).await;

    let alert = &h.controller.alerts()[0];
    assert_eq!(alert.location, UNKNOWN_LOCATION);
    assert!(alert.image_url.is_none());
    assert!(!h.notifier.notices()[0].has_image);
}

#[tokio::test]
async fn test_stalled_camera_still_logs_and_dispatches() {
    let h = Harness::with_settings(
        FakeMicrophone::new(),
        FakeConnector::new(),
        FakeCamera::stalled_feed(),
        Arc::new(FixedLocation::new(home())),
        ControllerSettings {
            snapshot_timeout: Duration::from_millis(50),
            ..ControllerSettings::default()
        },
    );
    let remote = h.arm_connected().await;

    remote.invoke_distress("call-1", "choking", "MORTAL_FEAR", 0.99);
    eventually(|| h.notifier.notices().len() == 1).await;

    let alerts = h.controller.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].location, "52.520000, 13.405000");
    assert!(alerts[0].image_url.is_none());
    assert!(!h.notifier.notices()[0].has_image);
}

#[tokio::test]
async fn test_alerts_are_most_recent_first() {
    let h = Harness::new();
    let remote = h.arm_connected().await;

    remote.invoke_distress("a", "first", "MORTAL_FEAR", 0.97);
    eventually(|| h.controller.alerts().len() == 1).await;
    remote.invoke_distress("b", "second", "COERCION", 0.97);
    eventually(|| h.controller.alerts().len() == 2).await;

    let alerts = h.controller.alerts();
    assert_eq!(alerts[0].call_id, "b");
    assert_eq!(alerts[1].call_id, "a");
    assert!(alerts[0].timestamp >= alerts[1].timestamp);
}
