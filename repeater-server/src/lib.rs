mod coordinator;
mod error;
mod room;
mod signaling;
mod transport;

pub use coordinator::*;
pub use error::*;
pub use room::*;
pub use signaling::*;
pub use transport::*;
