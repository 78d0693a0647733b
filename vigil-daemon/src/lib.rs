//! Vigil daemon library
//!
//! The arming controller and its supporting pieces, exposed for the binary
//! and for integration testing.

pub mod config;
pub mod controller;
pub mod error;
pub mod guards;
pub mod ipc;
pub mod notifier;
pub mod observer;
pub mod state;

pub use controller::{AlarmController, Capabilities, ControllerSettings};
pub use error::{ControllerError, Result};
pub use state::{AlertLog, EmergencyContact, ErrorRecord, StatusSnapshot, SystemState};
