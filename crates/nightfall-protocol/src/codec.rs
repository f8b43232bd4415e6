//! Codec trait and implementations.
//!
//! A codec converts between Rust values and raw bytes. Callers only see the
//! [`Codec`] trait, so a binary format can replace [`JsonCodec`] without
//! touching the engine or the room layer.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` so one codec can be shared by every room task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] on malformed or mismatched input.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use nightfall_protocol::{Codec, Command, JsonCodec, PlayerId};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Command::Accuse { target: PlayerId(3) }).unwrap();
/// let decoded: Command = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, Command::Accuse { target: PlayerId(3) });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl JsonCodec {
    /// Decodes one line of newline-delimited JSON, rejecting blank lines.
    pub fn decode_line<T: DeserializeOwned>(&self, line: &str) -> Result<T, ProtocolError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::InvalidMessage("empty line".into()));
        }
        self.decode(trimmed.as_bytes())
    }
}

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Command, Envelope, PlayerId, Recipient, RoomId};

    #[test]
    fn test_decode_line_blank_is_invalid_message() {
        let err = JsonCodec.decode_line::<Command>("   \n").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_decode_line_trims_trailing_newline() {
        let cmd: Command = JsonCodec.decode_line("{\"type\":\"Skip\"}\n").unwrap();
        assert_eq!(cmd, Command::Skip);
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let err = JsonCodec.decode::<Command>(b"not json at all").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_encode_envelope_keeps_sequence_and_recipient() {
        let env = Envelope {
            seq: 12,
            room_id: RoomId(2),
            to: Recipient::Player(PlayerId(5)),
            body: "dawn",
        };
        let json: serde_json::Value =
            serde_json::from_slice(&JsonCodec.encode(&env).unwrap()).unwrap();
        assert_eq!(json["seq"], 12);
        assert_eq!(json["room_id"], 2);
        assert_eq!(json["to"]["Player"], 5);
        assert_eq!(json["body"], "dawn");
    }
}
