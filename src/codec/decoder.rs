//! Message decoder

use bytes::Bytes;

use crate::error::DecodeError;
use crate::protocol::{Message, MessageKind};

/// Decode a datagram, copying its payload.
pub fn decode(datagram: &[u8]) -> Result<Message, DecodeError> {
    let (&header, payload) = datagram.split_first().ok_or(DecodeError::EmptyDatagram)?;
    let kind = MessageKind::from_header(header).ok_or(DecodeError::UnknownHeader(header))?;

    Ok(Message::new(kind, Bytes::copy_from_slice(payload)))
}

/// Decode an owned datagram without copying the payload.
pub fn decode_bytes(mut datagram: Bytes) -> Result<Message, DecodeError> {
    let header = *datagram.first().ok_or(DecodeError::EmptyDatagram)?;
    let kind = MessageKind::from_header(header).ok_or(DecodeError::UnknownHeader(header))?;

    let payload = datagram.split_off(1);
    Ok(Message::new(kind, payload))
}
