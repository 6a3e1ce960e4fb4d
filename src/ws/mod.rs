//! Event channel to the authoritative peer

pub mod channel;
pub mod protocol;
pub mod transport;

pub use channel::{ChannelHandle, SessionChannel};
pub use protocol::{ClientEvent, ProtocolError, ServerEvent};
pub use transport::{connect, Connection, TransportError};
