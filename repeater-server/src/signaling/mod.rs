mod control_sink;
mod ws_handler;
mod ws_writer;

pub use control_sink::*;
pub use ws_handler::*;
pub use ws_writer::*;
