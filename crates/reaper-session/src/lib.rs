//! Sessions for Reaper's Whispers.
//!
//! Each session runs as an isolated Tokio task (actor model) that owns the
//! game state and its turn clock.
//!
//! # Key types
//!
//! - [`Session`]: the pure state machine (join, start, move, power-ups,
//!   chat, moderation, challenges)
//! - [`SessionRegistry`]: creates, finds and evicts sessions by code
//! - [`SessionHandle`]: sends commands to a running session actor
//! - [`SessionConfig`]: board size, capacity, turn length and friends
//! - [`ChallengeProvider`]: pluggable puzzles guarding power-up pickups

mod actor;
mod challenge;
mod config;
mod error;
mod registry;
mod session;

pub use actor::{ParticipantSender, SessionHandle, SessionInfo};
pub use challenge::{
    AnswerKey, Challenge, ChallengeError, ChallengeProvider, FALLBACK_ANSWER, WordPuzzles,
    normalize_answer,
};
pub use config::{MIN_TURN_DURATION, PickupMode, SessionConfig};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{
    Events, Layout, MAX_CHAT_LEN, MAX_NAME_LEN, Participant, Pickup, PowerUp, Session,
};
