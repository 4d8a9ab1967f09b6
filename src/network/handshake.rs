//! Join handshake
//!
//! The client sends `Handshake{name}` and reads exactly one reply. The reply
//! is accepted only if it comes from the address the request went to, is a
//! Handshake and carries the literal `ok`.

use std::net::SocketAddr;
use std::time::Duration;

use crate::codec::{decode, encode};
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::HandshakeError;
use crate::network::udp::Transport;
use crate::protocol::{Message, MessageKind};

/// Run one request/reply exchange with a bounded wait for the reply.
pub fn exchange<T: Transport + ?Sized>(
    transport: &T,
    server: SocketAddr,
    name: &str,
    timeout: Duration,
) -> Result<(), HandshakeError> {
    transport.set_read_timeout(Some(timeout))?;

    let request = encode(MessageKind::Handshake, name.as_bytes());
    transport.send_to(&request, server)?;
    tracing::debug!("Handshake sent to {} as '{}'", server, name);

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let (len, from) = transport
        .recv_from(&mut buf)
        .map_err(HandshakeError::from_recv)?;

    let reply = validate_reply(server, from, &buf[..len]);
    if let Err(e) = &reply {
        tracing::warn!("Handshake with {} rejected: {}", server, e);
    }
    reply
}

/// Check a handshake reply against the expected endpoint.
pub fn validate_reply(
    expected: SocketAddr,
    from: SocketAddr,
    datagram: &[u8],
) -> Result<(), HandshakeError> {
    if from != expected {
        return Err(HandshakeError::UnexpectedSource {
            expected,
            actual: from,
        });
    }

    let reply: Message = decode(datagram)?;
    if reply.kind != MessageKind::Handshake {
        return Err(HandshakeError::UnexpectedKind(reply.kind));
    }
    if !reply.is_handshake_ack() {
        return Err(HandshakeError::UnexpectedPayload(reply.payload_text()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConnectionState, Session};
    use crate::testing::MockTransport;
    use std::sync::Arc;

    fn server() -> SocketAddr {
        "10.0.0.1:5000".parse().unwrap()
    }

    fn session_with(transport: &Arc<MockTransport>) -> Session<MockTransport> {
        Session::new("alice", server(), transport.clone())
    }

    #[test]
    fn test_accepts_ok_from_server() {
        let transport = Arc::new(MockTransport::new());
        transport.inject(b"\x33ok", server());

        let session = session_with(&transport);
        assert!(session.attempt_handshake(Duration::from_millis(100)).is_ok());
        assert!(session.is_connected());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, b"\x33alice".to_vec());
        assert_eq!(sent[0].1, server());
    }

    #[test]
    fn test_rejects_wrong_source() {
        let transport = Arc::new(MockTransport::new());
        transport.inject(b"\x33ok", "10.0.0.2:5000".parse().unwrap());

        let session = session_with(&transport);
        let result = session.attempt_handshake(Duration::from_millis(100));
        assert!(matches!(result, Err(HandshakeError::UnexpectedSource { .. })));
        assert_eq!(session.state(), ConnectionState::Pending);
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let transport = Arc::new(MockTransport::new());
        transport.inject(b"\x35ok", server());

        let session = session_with(&transport);
        let result = session.attempt_handshake(Duration::from_millis(100));
        assert!(matches!(result, Err(HandshakeError::UnexpectedKind(MessageKind::NowConnected))));
        assert!(!session.is_connected());
    }

    #[test]
    fn test_rejects_wrong_payload() {
        let transport = Arc::new(MockTransport::new());
        transport.inject(b"\x33full", server());

        let session = session_with(&transport);
        let result = session.attempt_handshake(Duration::from_millis(100));
        assert!(matches!(result, Err(HandshakeError::UnexpectedPayload(ref p)) if p == "full"));
        assert!(!session.is_connected());
    }

    #[test]
    fn test_rejects_undecodable_reply() {
        let transport = Arc::new(MockTransport::new());
        transport.inject(&[200, 1, 2], server());

        let session = session_with(&transport);
        let result = session.attempt_handshake(Duration::from_millis(100));
        assert!(matches!(result, Err(HandshakeError::Decode(_))));
        assert!(!session.is_connected());
    }

    #[test]
    fn test_times_out_without_reply() {
        let transport = Arc::new(MockTransport::new());

        let session = session_with(&transport);
        let result = session.attempt_handshake(Duration::from_millis(20));
        assert!(matches!(result, Err(HandshakeError::Timeout)));
        assert!(!session.is_connected());
        assert_eq!(transport.read_timeout(), Some(Duration::from_millis(20)));
    }
}
