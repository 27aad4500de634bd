//! Client → server intents.
//!
//! Every message a client sends is one [`Intent`]. The JSON form is
//! internally tagged on `kind` with camelCase fields:
//!
//! ```text
//! { "kind": "move", "sessionCode": "ABCDEF", "participantId": 3, "targetCell": 6 }
//! ```
//!
//! One enum, one dispatch function on the server: adding a variant here
//! makes every `match` on it fail to compile until it is handled.

use reaper_grid::Cell;
use serde::{Deserialize, Serialize};

use crate::{ModerationAction, ParticipantId, PowerUpId, SessionCode};

/// A request from a client to act on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Intent {
    /// Join (or create) the session with this code.
    #[serde(rename_all = "camelCase")]
    Join {
        session_code: SessionCode,
        participant_id: ParticipantId,
        name: String,
    },

    /// Host starts the game.
    #[serde(rename_all = "camelCase")]
    Start {
        session_code: SessionCode,
        participant_id: ParticipantId,
    },

    /// Step to an adjacent cell on your turn.
    #[serde(rename_all = "camelCase")]
    Move {
        session_code: SessionCode,
        participant_id: ParticipantId,
        target_cell: Cell,
    },

    /// Spend a held power-up on your turn.
    #[serde(rename_all = "camelCase")]
    UsePowerUp {
        session_code: SessionCode,
        participant_id: ParticipantId,
        power_up_id: PowerUpId,
    },

    /// Post to the session chat.
    #[serde(rename_all = "camelCase")]
    Chat {
        session_code: SessionCode,
        participant_id: ParticipantId,
        text: String,
    },

    /// Host moderation against another participant.
    #[serde(rename_all = "camelCase")]
    Moderate {
        session_code: SessionCode,
        participant_id: ParticipantId,
        action: ModerationAction,
        target_id: ParticipantId,
    },

    /// Answer the challenge guarding a pickup cell.
    #[serde(rename_all = "camelCase")]
    Answer {
        session_code: SessionCode,
        participant_id: ParticipantId,
        answer: String,
    },

    /// Leave the session voluntarily.
    #[serde(rename_all = "camelCase")]
    Leave {
        session_code: SessionCode,
        participant_id: ParticipantId,
    },

    /// Ask which cells you could step to from where you stand.
    #[serde(rename_all = "camelCase")]
    RequestValidMoves {
        session_code: SessionCode,
        participant_id: ParticipantId,
    },
}

impl Intent {
    /// The session this intent targets.
    pub fn session_code(&self) -> &SessionCode {
        match self {
            Self::Join { session_code, .. }
            | Self::Start { session_code, .. }
            | Self::Move { session_code, .. }
            | Self::UsePowerUp { session_code, .. }
            | Self::Chat { session_code, .. }
            | Self::Moderate { session_code, .. }
            | Self::Answer { session_code, .. }
            | Self::Leave { session_code, .. }
            | Self::RequestValidMoves { session_code, .. } => session_code,
        }
    }

    /// The participant the client claims to be.
    pub fn participant_id(&self) -> ParticipantId {
        match self {
            Self::Join { participant_id, .. }
            | Self::Start { participant_id, .. }
            | Self::Move { participant_id, .. }
            | Self::UsePowerUp { participant_id, .. }
            | Self::Chat { participant_id, .. }
            | Self::Moderate { participant_id, .. }
            | Self::Answer { participant_id, .. }
            | Self::Leave { participant_id, .. }
            | Self::RequestValidMoves { participant_id, .. } => *participant_id,
        }
    }

    /// The wire tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Start { .. } => "start",
            Self::Move { .. } => "move",
            Self::UsePowerUp { .. } => "usePowerUp",
            Self::Chat { .. } => "chat",
            Self::Moderate { .. } => "moderate",
            Self::Answer { .. } => "answer",
            Self::Leave { .. } => "leave",
            Self::RequestValidMoves { .. } => "requestValidMoves",
        }
    }
}
