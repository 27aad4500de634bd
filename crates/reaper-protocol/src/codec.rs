//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust values and raw bytes. The gateway only
//! needs something that implements [`Codec`]; today that is [`JsonCodec`],
//! which every browser client can speak without extra tooling.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because the codec is shared by every connection
/// task in the gateway.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed, carry an
    /// unknown tag, or are missing a field.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature (on by default).
///
/// ## Example
///
/// ```rust
/// use reaper_protocol::{Codec, Intent, JsonCodec, ParticipantId, SessionCode};
///
/// let codec = JsonCodec;
///
/// let intent = Intent::Move {
///     session_code: SessionCode::new("ABCDEF"),
///     participant_id: ParticipantId(3),
///     target_cell: 6,
/// };
///
/// let bytes = codec.encode(&intent).unwrap();
/// let decoded: Intent = codec.decode(&bytes).unwrap();
/// assert_eq!(intent, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

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
    use crate::{ErrorCode, Intent, ServerEvent};

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = JsonCodec.decode::<Intent>(b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_encode_event_is_utf8_json() {
        let bytes = JsonCodec
            .encode(&ServerEvent::error(ErrorCode::Muted, "you are muted"))
            .unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("\"type\":\"error\""));
        assert!(text.contains("\"code\":\"Muted\""));
    }
}
