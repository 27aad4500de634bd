//! Unified error type for the server.

use reaper_protocol::{ErrorCode, ProtocolError};
use reaper_session::SessionError;
use reaper_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ReaperError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A malformed or invalid message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rejected game operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ReaperError {
    /// The code a client sees for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Session(e) => e.code(),
            Self::Protocol(_) | Self::Config(_) => ErrorCode::BadRequest,
            Self::Transport(_) => ErrorCode::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use reaper_protocol::SessionCode;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: ReaperError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, ReaperError::Transport(_)));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.code(), ErrorCode::Unavailable);
    }

    #[test]
    fn test_protocol_error_is_bad_request() {
        let err: ReaperError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, ReaperError::Protocol(_)));
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_session_error_keeps_its_code() {
        let err: ReaperError = SessionError::SessionFull(SessionCode::new("ABCDEF")).into();
        assert_eq!(err.code(), ErrorCode::SessionFull);
        assert_eq!(err.to_string(), "session ABCDEF is full");
    }

    #[test]
    fn test_from_config_error() {
        let err: ReaperError = ConfigError::Invalid {
            var: "REAPER_SEED",
            value: "x".into(),
            expected: "an unsigned integer",
        }
        .into();
        assert!(matches!(err, ReaperError::Config(_)));
        assert!(err.to_string().contains("REAPER_SEED"));
    }
}
