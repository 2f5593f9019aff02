use crate::error::SfuError;
use async_trait::async_trait;
use repeater_core::WsMessage;

/// Outbound half of a client's control channel.
///
/// The WebSocket writer implements this in production; tests substitute a
/// capturing mock.
#[async_trait]
pub trait ControlSink: Send + Sync {
    /// Serialize and write one frame. At most one frame is in flight at a
    /// time; fails with `TransportClosed` once the channel is unwritable.
    async fn send(&self, msg: &WsMessage) -> Result<(), SfuError>;
}
