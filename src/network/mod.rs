//! Network subsystem: UDP transport, handshake and the two session loops

pub mod handshake;
pub mod receiver;
pub mod sender;
pub mod udp;

pub use receiver::{DropReason, ReceiveLoop, ReceiveStep};
pub use sender::{TransmitLoop, TransmitSettings, TransmitStep};
pub use udp::{create_socket, resolve, Transport, UdpTransport};
