mod forwarder;
mod room;

pub use room::*;
