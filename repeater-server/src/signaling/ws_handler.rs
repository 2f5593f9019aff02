use crate::coordinator::Coordinator;
use crate::signaling::{ControlSink, WsWriter};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::StreamExt;
use repeater_core::WsMessage;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(coordinator): State<Arc<Coordinator>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator))
}

async fn handle_socket(socket: WebSocket, coordinator: Arc<Coordinator>) {
    info!("New control connection");

    let (sink, mut stream) = socket.split();
    let writer: Arc<dyn ControlSink> = Arc::new(WsWriter::new(sink));

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Control channel read failed: {}", e);
                break;
            }
        };

        match frame {
            Message::Text(text) => {
                let msg: WsMessage = match serde_json::from_str(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("Failed to decode control frame: {}", e);
                        break;
                    }
                };

                coordinator.handle_event(msg, Arc::clone(&writer)).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // No peer reaping here: the transport-closed callback drives cleanup
    // through the signaling engine.
    info!("Control connection closed");
}
