use crate::error::SfuError;
use crate::signaling::ControlSink;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use repeater_core::WsMessage;
use tokio::sync::Mutex;
use tracing::error;

/// Write half of a client's WebSocket, serialized under a lock so frames
/// never interleave. Reads stay with the ingress task that owns the socket.
pub struct WsWriter {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsWriter {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl ControlSink for WsWriter {
    async fn send(&self, msg: &WsMessage) -> Result<(), SfuError> {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize control frame: {}", e);
                return Ok(());
            }
        };

        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(json))
            .await
            .map_err(|_| SfuError::TransportClosed)
    }
}
