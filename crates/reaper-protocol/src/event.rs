//! Server → client events and the session snapshot.
//!
//! Events are internally tagged on `type`. The snapshot is the full,
//! already-redacted view of a session for one recipient: the server
//! builds one per member, so nothing a survivor must not see is ever
//! serialized into their copy.

use reaper_grid::Cell;
use serde::{Deserialize, Serialize};

use crate::{
    ChallengeKind, ErrorCode, ParticipantId, PowerUpId, PowerUpKind, Role,
    SessionCode, SessionStatus, Side,
};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One participant as a given viewer is allowed to see them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    /// `None` when the viewer may not know this participant's role.
    pub role: Option<Role>,
    /// `None` before placement, or when hidden from the viewer.
    pub position: Option<Cell>,
    pub alive: bool,
    pub muted: bool,
    /// Full inventory for the viewer themselves, empty for everyone else.
    pub power_ups: Vec<PowerUpView>,
    /// Number of held power-ups. `None` when hidden from the viewer.
    pub power_up_count: Option<usize>,
}

/// A held power-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUpView {
    pub id: PowerUpId,
    pub kind: PowerUpKind,
}

/// Whose turn it is and until when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnView {
    pub participant_id: ParticipantId,
    pub generation: u64,
    /// Unix milliseconds.
    pub started_at_ms: u64,
    pub duration_ms: u64,
    /// Unix milliseconds.
    pub deadline_ms: u64,
}

/// The state of a session as seen by one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_code: SessionCode,
    pub status: SessionStatus,
    pub roster: Vec<ParticipantView>,
    /// One entry per cell, row-major. Hidden occupants read as `None`.
    pub board: Vec<Option<ParticipantId>>,
    pub current_turn: Option<TurnView>,
    pub winner: Option<Side>,
    pub host: Option<ParticipantId>,
    pub board_size: usize,
    pub goal_cells: Vec<Cell>,
    pub power_up_cells: Vec<Cell>,
    /// The participant this snapshot was built for.
    pub viewer: ParticipantId,
}

impl SessionSnapshot {
    /// The roster entry for `id`, if present.
    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantView> {
        self.roster.iter().find(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// Other payloads
// ---------------------------------------------------------------------------

/// One chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub sender: ParticipantId,
    pub name: String,
    pub text: String,
    /// Unix milliseconds.
    pub timestamp_ms: u64,
}

/// The public half of a challenge: what the solver is asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePrompt {
    pub kind: ChallengeKind,
    pub prompt: String,
    pub cell: Cell,
}

/// Why a participant was taken off the roster by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalReason {
    Kicked,
    Banned,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Everything the server can send to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First message on every connection.
    #[serde(rename_all = "camelCase")]
    Welcome { participant_id: ParticipantId },

    /// Redacted session state, sent after every accepted intent.
    Snapshot(SessionSnapshot),

    /// A rejected intent. Only the originating connection receives it.
    Error { code: ErrorCode, message: String },

    /// Private result of a `reveal` power-up.
    #[serde(rename_all = "camelCase")]
    Revealed { adversary_cell: Option<Cell> },

    /// Private answer to `requestValidMoves`: the cells adjacent to you.
    ValidMoves { cells: Vec<Cell> },

    /// Private notice that your turn ran out.
    TurnExpired { generation: u64 },

    /// Private challenge guarding the pickup you stepped on.
    Challenge(ChallengePrompt),

    /// Private outcome of an `answer` intent.
    ChallengeResult {
        solved: bool,
        granted: Option<PowerUpKind>,
    },

    /// A chat line, broadcast to everyone in the session.
    Chat(ChatEntry),

    /// Private notice that the host removed you.
    Removed { reason: RemovalReason },
}

impl ServerEvent {
    /// Builds an error event.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}
