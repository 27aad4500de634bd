//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes or the shape of a message were
//! wrong. Game rule violations live in the session crate.

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `kind` tag,
    /// a missing field, or a field of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates a protocol rule, e.g. an empty
    /// session code.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
