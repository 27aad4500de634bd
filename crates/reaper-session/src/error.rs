//! Error types for the session layer.

use reaper_grid::GridError;
use reaper_protocol::{ErrorCode, ParticipantId, PowerUpId, SessionCode};

/// Why a session rejected an operation.
///
/// Every rejection happens before any state changes, so the session is
/// exactly as it was. Each variant maps to a stable [`ErrorCode`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No live session has this code.
    #[error("session {0} not found")]
    NotFound(SessionCode),

    /// The operation is not valid in the session's current status, or
    /// its input is malformed (empty name, over-long chat line).
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("participant {0} has been eliminated")]
    Eliminated(ParticipantId),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("participant {0} is banned from this session")]
    AlreadyBanned(ParticipantId),

    #[error("name {0:?} is already taken")]
    NameTaken(String),

    #[error("session {0} is full")]
    SessionFull(SessionCode),

    #[error("at least {needed} participants are needed, have {have}")]
    InsufficientPlayers { needed: usize, have: usize },

    #[error("only the host can do that")]
    NotHost,

    #[error("power-up {0} is not held")]
    PowerUpNotHeld(PowerUpId),

    /// A cell index outside the board.
    #[error(transparent)]
    OutOfBounds(#[from] GridError),

    #[error("you are muted")]
    Muted,

    #[error("participant {0} is not in this session")]
    UnknownParticipant(ParticipantId),

    #[error("there is no open challenge to answer")]
    NoChallenge,

    /// The session's actor has stopped or its channel is closed.
    #[error("session {0} is unavailable")]
    Unavailable(SessionCode),
}

impl SessionError {
    /// The wire code clients match on.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidState(_) => ErrorCode::InvalidState,
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::Eliminated(_) => ErrorCode::Eliminated,
            Self::IllegalMove(_) => ErrorCode::IllegalMove,
            Self::AlreadyBanned(_) => ErrorCode::AlreadyBanned,
            Self::NameTaken(_) => ErrorCode::NameTaken,
            Self::SessionFull(_) => ErrorCode::SessionFull,
            Self::InsufficientPlayers { .. } => ErrorCode::InsufficientPlayers,
            Self::NotHost => ErrorCode::NotHost,
            Self::PowerUpNotHeld(_) => ErrorCode::PowerUpNotHeld,
            Self::OutOfBounds(_) => ErrorCode::OutOfBounds,
            Self::Muted => ErrorCode::Muted,
            Self::UnknownParticipant(_) => ErrorCode::UnknownParticipant,
            Self::NoChallenge => ErrorCode::NoChallenge,
            Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}
