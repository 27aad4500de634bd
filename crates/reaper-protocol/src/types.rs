//! Identity types and the small enums shared by intents and events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Connection-scoped identity of a participant.
///
/// The gateway mints one per accepted connection, so a participant who
/// reconnects is a new participant. Serialized as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The code players type to meet in the same session (e.g. `"ABCDEF"`).
///
/// Serialized as a plain string. Use [`SessionCode::parse`] on anything
/// that came from a client; the raw constructor is for trusted input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Longest accepted code, in characters.
    pub const MAX_LEN: usize = 32;

    /// Wraps a code without validation.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Trims and validates a client-supplied code.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] if the trimmed code is empty or
    /// longer than [`Self::MAX_LEN`] characters.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code = raw.trim();
        if code.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "session code must not be empty".into(),
            ));
        }
        if code.chars().count() > Self::MAX_LEN {
            return Err(ProtocolError::InvalidMessage(format!(
                "session code longer than {} characters",
                Self::MAX_LEN
            )));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session identifier of a held power-up.
pub type PowerUpId = u32;

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every member of the session.
    All,
    /// Exactly one participant. Private events (errors, reveals) use this.
    Participant(ParticipantId),
    /// Everyone except one participant.
    AllExcept(ParticipantId),
}

impl Recipient {
    /// Returns `true` if `participant` should receive an event with this
    /// recipient.
    pub fn includes(&self, participant: ParticipantId) -> bool {
        match self {
            Self::All => true,
            Self::Participant(p) => *p == participant,
            Self::AllExcept(p) => *p != participant,
        }
    }
}

// ---------------------------------------------------------------------------
// Game enums
// ---------------------------------------------------------------------------

/// Lifecycle of a session: `waiting → active → finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Finished,
}

impl SessionStatus {
    /// The only status that may follow this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Active),
            Self::Active => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` does not skip a state.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// A participant's hidden role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// The Reaper.
    Adversary,
    Survivor,
}

/// The side that won a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Adversary,
    Survivors,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adversary => write!(f, "adversary"),
            Self::Survivors => write!(f, "survivors"),
        }
    }
}

/// Kinds of power-up a pickup cell can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerUpKind {
    /// Absorbs one catch; the holder is knocked to a free neighbouring cell.
    Shield,
    /// Privately shows the requester where the adversary stands.
    Reveal,
    /// One extra move in the current turn.
    Speed,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] =
        [PowerUpKind::Shield, PowerUpKind::Reveal, PowerUpKind::Speed];
}

/// Host-only moderation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModerationAction {
    Kick,
    Ban,
    Mute,
    Unban,
    Unmute,
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kick => write!(f, "kick"),
            Self::Ban => write!(f, "ban"),
            Self::Mute => write!(f, "mute"),
            Self::Unban => write!(f, "unban"),
            Self::Unmute => write!(f, "unmute"),
        }
    }
}

/// Puzzle families a challenge can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeKind {
    Anagram,
    Category,
    WordChain,
    /// The trivial challenge used when a provider fails.
    Fallback,
}

/// Stable machine-readable codes for rejected intents.
///
/// Serialized with the variant name (`"NotYourTurn"`), which clients
/// match on. Never renumber or rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    InvalidState,
    NotYourTurn,
    Eliminated,
    IllegalMove,
    AlreadyBanned,
    NameTaken,
    SessionFull,
    InsufficientPlayers,
    NotHost,
    PowerUpNotHeld,
    OutOfBounds,
    Muted,
    UnknownParticipant,
    NoChallenge,
    Unavailable,
    /// The intent could not be decoded or failed a protocol rule.
    BadRequest,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same text as the wire form.
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ParticipantId(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(ParticipantId(7).to_string(), "P-7");
    }

    #[test]
    fn test_session_code_parse_trims() {
        let code = SessionCode::parse("  ABCDEF ").unwrap();
        assert_eq!(code.as_str(), "ABCDEF");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"ABCDEF\"");
    }

    #[test]
    fn test_session_code_parse_rejects_empty_and_long() {
        assert!(SessionCode::parse("   ").is_err());
        assert!(SessionCode::parse(&"x".repeat(33)).is_err());
        assert!(SessionCode::parse(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn test_status_transitions_never_skip() {
        assert!(SessionStatus::Waiting.can_transition_to(SessionStatus::Active));
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Finished));
        assert!(!SessionStatus::Waiting.can_transition_to(SessionStatus::Finished));
        assert!(!SessionStatus::Finished.can_transition_to(SessionStatus::Waiting));
        assert_eq!(SessionStatus::Finished.next(), None);
    }

    #[test]
    fn test_recipient_includes() {
        let me = ParticipantId(1);
        let other = ParticipantId(2);
        assert!(Recipient::All.includes(me));
        assert!(Recipient::Participant(me).includes(me));
        assert!(!Recipient::Participant(me).includes(other));
        assert!(!Recipient::AllExcept(me).includes(me));
        assert!(Recipient::AllExcept(me).includes(other));
    }

    #[test]
    fn test_error_code_wire_form_is_variant_name() {
        let json = serde_json::to_string(&ErrorCode::NotYourTurn).unwrap();
        assert_eq!(json, "\"NotYourTurn\"");
        assert_eq!(ErrorCode::PowerUpNotHeld.to_string(), "PowerUpNotHeld");
    }

    #[test]
    fn test_power_up_kind_camel_case() {
        let json = serde_json::to_string(&PowerUpKind::Reveal).unwrap();
        assert_eq!(json, "\"reveal\"");
    }
}
