//! Codec trait and the JSON implementation used on the wire.
//!
//! The relay only ever speaks JSON, but keeping the [`Codec`] seam lets the
//! server and the tests encode through the same object and keeps
//! serialization errors in one error type.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ClientMessage, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes an inbound frame and applies the protocol's field rules.
    ///
    /// Any error here means the frame is malformed and should be dropped
    /// without a reply.
    fn decode_client(&self, data: &[u8]) -> Result<ClientMessage, ProtocolError> {
        let msg: ClientMessage = self.decode(data)?;
        msg.validate()?;
        Ok(msg)
    }
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use boardlink_protocol::{Codec, JsonCodec, ServerMessage};
///
/// let bytes = JsonCodec.encode(&ServerMessage::Hello).unwrap();
/// assert_eq!(bytes, br#"{"type":"hello"}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoomId, SeatRequest};

    #[test]
    fn test_decode_client_accepts_join() {
        let msg = JsonCodec
            .decode_client(br#"{"type":"join","room":"abc","seat":"B","name":"ann"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                room: RoomId::new("abc"),
                seat: SeatRequest::B,
                name: Some("ann".into()),
            }
        );
    }

    #[test]
    fn test_decode_client_rejects_garbage() {
        let err = JsonCodec.decode_client(b"not json at all").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_client_rejects_empty_room() {
        let err = JsonCodec
            .decode_client(br#"{"type":"join","room":"","seat":"A"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_decode_client_rejects_unknown_type() {
        let err = JsonCodec
            .decode_client(br#"{"type":"chat","text":"hi"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }
}
