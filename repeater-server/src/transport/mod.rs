mod peer;
mod transport_config;
mod transport_event;

pub use peer::*;
pub use transport_config::*;
pub use transport_event::*;
