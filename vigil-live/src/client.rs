//! WebSocket connector for the Gemini Live endpoint

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::error::{LiveError, Result};
use crate::protocol::{ClientMessage, ServerMessage, Setup};
use crate::transport::{LiveConnection, LiveConnector, TransportEvent};

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-live-001";

#[derive(Clone)]
pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
}

impl GeminiLiveConnector {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, separator, self.api_key)
    }
}

// The key never reaches logs
impl fmt::Debug for GeminiLiveConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiLiveConnector")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(&self, setup: Setup) -> Result<LiveConnection> {
        if self.api_key.is_empty() {
            return Err(LiveError::connection("No API key configured"));
        }

        info!("Connecting to {}", self.endpoint);
        let (socket, _response) = connect_async(self.url())
            .await
            .map_err(|e| LiveError::connection(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let setup = ClientMessage::Setup(setup).to_json()?;
        sink.send(Message::Text(setup))
            .await
            .map_err(|e| LiveError::connection(format!("Failed to send setup: {}", e)))?;

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

        let _ = inbound_tx.send(TransportEvent::Opened);

        // Writer: drains the outbound queue; closes the socket once the
        // session drops its sender
        let writer_events = inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Dropping unserializable frame: {}", e);
                        continue;
                    }
                };

                if let Err(e) = sink.send(Message::Text(text)).await {
                    let _ = writer_events.send(TransportEvent::Errored(format!("Send failed: {}", e)));
                    return;
                }
            }

            let _ = sink.send(Message::Close(None)).await;
            debug!("Live connection writer closed");
        });

        // Reader
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => forward(&inbound_tx, text.as_bytes()),
                    Ok(Message::Binary(bytes)) => forward(&inbound_tx, &bytes),
                    Ok(Message::Close(close)) => {
                        let reason = close
                            .map(|c| c.reason.to_string())
                            .filter(|r| !r.is_empty());
                        let _ = inbound_tx.send(TransportEvent::Closed { reason });
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = inbound_tx.send(TransportEvent::Errored(e.to_string()));
                        return;
                    }
                }
            }

            let _ = inbound_tx.send(TransportEvent::Closed { reason: None });
        });

        Ok(LiveConnection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn forward(events: &mpsc::UnboundedSender<TransportEvent>, bytes: &[u8]) {
    match ServerMessage::parse(bytes) {
        Ok(message) => {
            let _ = events.send(TransportEvent::Message(message));
        }
        Err(e) => trace!("Skipping unparseable frame: {}", e),
    }
}
