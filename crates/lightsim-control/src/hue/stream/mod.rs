//! Entertainment streaming: packet codec and UDP receive loop

pub mod listener;
pub mod protocol;

pub use listener::{DatagramSink, StreamListener};
pub use protocol::{StreamEntry, StreamPacket};
