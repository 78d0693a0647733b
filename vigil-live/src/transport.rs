//! Connector seam between the session and the remote engine

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::{ClientMessage, ServerMessage, Setup};

/// Lifecycle and message events of one connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Socket open and setup frame written
    Opened,
    Message(ServerMessage),
    Closed { reason: Option<String> },
    Errored(String),
}

/// Both ends of an open connection.
///
/// Sending on `outbound` never blocks; frames go out in FIFO order.
/// Dropping `outbound` closes the connection.
pub struct LiveConnection {
    pub outbound: mpsc::UnboundedSender<ClientMessage>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections to the detection engine
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, setup: Setup) -> Result<LiveConnection>;
}
