//! Datagram codec
//!
//! Pure conversion between [`Message`](crate::protocol::Message) values and
//! their wire bytes. No state, no I/O.

pub mod encoder;
pub mod decoder;

pub use encoder::{encode, encode_into, MessageEncoder};
pub use decoder::{decode, decode_bytes};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::protocol::{Message, MessageKind};
    use proptest::prelude::*;

    fn any_kind() -> impl Strategy<Value = MessageKind> {
        prop::sample::select(MessageKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn roundtrip_preserves_kind_and_payload(
            kind in any_kind(),
            payload in prop::collection::vec(any::<u8>(), 0..1100),
        ) {
            let wire = encode(kind, &payload);
            let message = decode(&wire).unwrap();
            prop_assert_eq!(message, Message::new(kind, payload));
        }

        #[test]
        fn header_alone_decides_kind(
            header in any::<u8>(),
            payload in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut wire = vec![header];
            wire.extend_from_slice(&payload);

            match (MessageKind::from_header(header), decode(&wire)) {
                (Some(kind), Ok(message)) => {
                    prop_assert_eq!(message.kind, kind);
                    prop_assert_eq!(message.payload.as_ref(), &payload[..]);
                }
                (None, Err(err)) => prop_assert_eq!(err, DecodeError::UnknownHeader(header)),
                (expected, got) => prop_assert!(false, "{:?} vs {:?}", expected, got),
            }
        }
    }
}
