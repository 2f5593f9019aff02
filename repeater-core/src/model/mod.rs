mod message;
mod peer;
mod room;

pub use message::WsMessage;
pub use peer::PeerId;
pub use room::RoomId;
