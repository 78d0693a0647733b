//! Real-time status broadcaster for Vigil UI clients
//!
//! A Unix socket server streaming the controller's state to any number of
//! UI clients as newline-delimited JSON. New clients receive a catch-up
//! (current state, display flags, alert log, last error) before live events.
//!
//! # Event Types
//!
//! - `state_change` - idle / connecting / armed / danger
//! - `volume` - microphone level, 0..=255
//! - `alert` - a new alert log entry
//! - `error` - displayable error record
//! - `connection_lost` - detection service hung up while armed
//! - `display_change` - silent mode / blackout toggled
//!
//! # Example Usage
//!
//! ```no_run
//! use vigil_broadcaster::StatusBroadcaster;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broadcaster = StatusBroadcaster::new("/tmp/vigil_ui.sock");
//!     broadcaster.start().await?;
//!
//!     broadcaster.broadcast_state_change("armed", true).await;
//!     broadcaster.broadcast_volume(42.0).await;
//!
//!     broadcaster.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client;
pub mod error;
pub mod events;

pub use broadcaster::StatusBroadcaster;
pub use client::CatchUp;
pub use error::{BroadcasterError, Result};
pub use events::{AlertEntry, StatusEvent};
