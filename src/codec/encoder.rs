//! Message encoder
//!
//! Writes one header byte followed by the raw payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::MAX_DATAGRAM_SIZE;
use crate::protocol::MessageKind;

/// Encode a message into a freshly allocated datagram.
pub fn encode(kind: MessageKind, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    encode_into(&mut buf, kind, payload);
    buf.freeze()
}

/// Append the wire form of a message to `buf`.
pub fn encode_into(buf: &mut BytesMut, kind: MessageKind, payload: &[u8]) {
    buf.reserve(1 + payload.len());
    buf.put_u8(kind.header());
    buf.put_slice(payload);
}

/// Encoder that reuses one buffer across datagrams.
///
/// Owned by a single loop; the returned slice is valid until the next call.
pub struct MessageEncoder {
    /// Encoding buffer (reused to avoid allocations)
    buffer: BytesMut,
    /// Messages encoded
    messages_encoded: u64,
    /// Total bytes produced
    bytes_produced: u64,
}

impl MessageEncoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_DATAGRAM_SIZE),
            messages_encoded: 0,
            bytes_produced: 0,
        }
    }

    /// Encode into the internal buffer and return the datagram.
    pub fn encode(&mut self, kind: MessageKind, payload: &[u8]) -> &[u8] {
        self.buffer.clear();
        encode_into(&mut self.buffer, kind, payload);

        self.messages_encoded += 1;
        self.bytes_produced += self.buffer.len() as u64;

        &self.buffer
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            messages_encoded: self.messages_encoded,
            bytes_produced: self.bytes_produced,
        }
    }
}

impl Default for MessageEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encoder statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderStats {
    pub messages_encoded: u64,
    pub bytes_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_then_payload() {
        assert_eq!(encode(MessageKind::Handshake, b"alice").as_ref(), b"\x33alice");
        assert_eq!(encode(MessageKind::Disconnection, b"bob").as_ref(), b"\x34bob");
        assert_eq!(encode(MessageKind::NowConnected, b"?").as_ref(), b"\x35?");
        assert_eq!(encode(MessageKind::ClientData, &[1, 2]).as_ref(), &[0, 1, 2]);
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(encode(MessageKind::Handshake, &[]).as_ref(), &[51]);
    }

    #[test]
    fn test_reused_encoder() {
        let mut encoder = MessageEncoder::new();

        assert_eq!(encoder.encode(MessageKind::ClientData, &[7; 1024]).len(), 1025);
        assert_eq!(encoder.encode(MessageKind::NowConnected, b"?"), b"\x35?");

        let stats = encoder.stats();
        assert_eq!(stats.messages_encoded, 2);
        assert_eq!(stats.bytes_produced, 1027);
    }
}
