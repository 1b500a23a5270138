//! Relay networking: wire protocol and transport session

pub mod protocol;
pub mod transport;

pub use protocol::{InboundEvent, OutboundEvent, Position};
pub use transport::TransportSession;
