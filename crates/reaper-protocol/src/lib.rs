//! Wire protocol for Reaper's Whispers.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Intents** ([`Intent`]): every client → server request, tagged on
//!   `kind`.
//! - **Events** ([`ServerEvent`], [`SessionSnapshot`]): every server →
//!   client message, tagged on `type`.
//! - **Shared types** ([`ParticipantId`], [`SessionCode`], [`Role`],
//!   [`ErrorCode`], ...).
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ values.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or game rules. It sits
//! between the transport (raw frames) and the session engine:
//!
//! ```text
//! Transport (bytes) → Protocol (Intent) → Session (rules) → Protocol (ServerEvent)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod event;
mod intent;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{
    ChallengePrompt, ChatEntry, ParticipantView, PowerUpView, RemovalReason,
    ServerEvent, SessionSnapshot, TurnView,
};
pub use intent::Intent;
pub use reaper_grid::Cell;
pub use types::{
    ChallengeKind, ErrorCode, ModerationAction, ParticipantId, PowerUpId,
    PowerUpKind, Recipient, Role, SessionCode, SessionStatus, Side,
};
