//! Wire protocol message types
//!
//! Every datagram is `[header byte][payload...]`. There is no length field;
//! the payload runs to the end of the datagram.
//!
//! | Header  | Kind          | Payload                                  |
//! |---------|---------------|------------------------------------------|
//! | 0..=50  | ClientData    | raw 16-bit PCM                           |
//! | 51      | Handshake     | UTF-8 name (request) or `ok` (reply)     |
//! | 52      | Disconnection | UTF-8 name                               |
//! | 53      | NowConnected  | placeholder or `;`-joined roster         |

use bytes::Bytes;

/// Lowest header value of the ClientData range
pub const CLIENT_DATA_MIN: u8 = 0;

/// Highest header value of the ClientData range
pub const CLIENT_DATA_MAX: u8 = 50;

/// Header byte for Handshake
pub const HANDSHAKE: u8 = 51;

/// Header byte for Disconnection
pub const DISCONNECTION: u8 = 52;

/// Header byte for NowConnected
pub const NOW_CONNECTED: u8 = 53;

/// Payload the endpoint sends back to accept a handshake
pub const HANDSHAKE_ACK: &[u8] = b"ok";

/// Payload of the periodic liveness probe
pub const LIVENESS_PROBE: &[u8] = b"?";

/// Separator between names in a roster payload
pub const ROSTER_DELIMITER: char = ';';

/// Kind of a protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Voice samples
    ClientData,
    /// Join request / acknowledgment
    Handshake,
    /// Leave notice
    Disconnection,
    /// Liveness probe / roster broadcast
    NowConnected,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::ClientData,
        MessageKind::Handshake,
        MessageKind::Disconnection,
        MessageKind::NowConnected,
    ];

    /// Header byte written for this kind.
    ///
    /// ClientData owns a range; the channel sub-field is unused and always 0.
    pub const fn header(self) -> u8 {
        match self {
            MessageKind::ClientData => CLIENT_DATA_MIN,
            MessageKind::Handshake => HANDSHAKE,
            MessageKind::Disconnection => DISCONNECTION,
            MessageKind::NowConnected => NOW_CONNECTED,
        }
    }

    /// Classify a header byte. `None` means the datagram is not ours.
    pub const fn from_header(header: u8) -> Option<MessageKind> {
        match header {
            // ClientData is a range, not a single value
            CLIENT_DATA_MIN..=CLIENT_DATA_MAX => Some(MessageKind::ClientData),
            HANDSHAKE => Some(MessageKind::Handshake),
            DISCONNECTION => Some(MessageKind::Disconnection),
            NOW_CONNECTED => Some(MessageKind::NowConnected),
            _ => None,
        }
    }
}

/// A decoded (or to-be-encoded) protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Bytes,
}

impl Message {
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn handshake(name: &str) -> Self {
        Self::new(MessageKind::Handshake, Bytes::copy_from_slice(name.as_bytes()))
    }

    pub fn disconnection(name: &str) -> Self {
        Self::new(MessageKind::Disconnection, Bytes::copy_from_slice(name.as_bytes()))
    }

    /// Whether this is the endpoint's handshake acceptance.
    pub fn is_handshake_ack(&self) -> bool {
        self.kind == MessageKind::Handshake && self.payload.as_ref() == HANDSHAKE_ACK
    }

    /// Payload as lossy UTF-8, for logging and names.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_data_range() {
        for header in CLIENT_DATA_MIN..=CLIENT_DATA_MAX {
            assert_eq!(MessageKind::from_header(header), Some(MessageKind::ClientData));
        }
    }

    #[test]
    fn test_reserved_headers() {
        assert_eq!(MessageKind::from_header(51), Some(MessageKind::Handshake));
        assert_eq!(MessageKind::from_header(52), Some(MessageKind::Disconnection));
        assert_eq!(MessageKind::from_header(53), Some(MessageKind::NowConnected));
        for header in 54..=u8::MAX {
            assert_eq!(MessageKind::from_header(header), None);
        }
    }

    #[test]
    fn test_header_classifies_back() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_header(kind.header()), Some(kind));
        }
    }

    #[test]
    fn test_handshake_ack() {
        assert!(Message::new(MessageKind::Handshake, &b"ok"[..]).is_handshake_ack());
        assert!(!Message::new(MessageKind::Handshake, &b"OK"[..]).is_handshake_ack());
        assert!(!Message::new(MessageKind::NowConnected, &b"ok"[..]).is_handshake_ack());
    }
}
