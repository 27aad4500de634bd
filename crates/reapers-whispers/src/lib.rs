//! # Reaper's Whispers
//!
//! Server for a hidden-role maze game. Participants join a session by
//! code, one of them is secretly dealt the adversary role, and everyone
//! takes timed turns moving around a square grid. Survivors race to a goal
//! cell; the adversary hunts them.
//!
//! The server is authoritative: clients send [`Intent`]s, the session
//! actor applies the rules, and every participant receives a snapshot
//! redacted to what they are allowed to know.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reapers_whispers::prelude::*;
//!
//! # async fn run() -> Result<(), ReaperError> {
//! init_logging();
//! let server = ReaperServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! [`Intent`]: reaper_protocol::Intent

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod config;
mod error;
mod handler;
mod logging;
mod processor;
mod server;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use config::{ConfigError, DEFAULT_BIND, ServerConfig};
pub use error::ReaperError;
pub use logging::{DEFAULT_FILTER, init_logging};
pub use processor::IntentProcessor;
pub use server::{ReaperServer, ReaperServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{
        ConfigError, IntentProcessor, ReaperError, ReaperServer, ReaperServerBuilder,
        ServerConfig, init_logging,
    };
    pub use reaper_grid::{Cell, Grid};
    pub use reaper_protocol::{
        Codec, ErrorCode, Intent, JsonCodec, ModerationAction, ParticipantId, PowerUpKind,
        Role, ServerEvent, SessionCode, SessionSnapshot, SessionStatus, Side,
    };
    pub use reaper_session::{
        ChallengeProvider, Layout, PickupMode, SessionConfig, SessionError, SessionHandle,
        SessionRegistry,
    };
    pub use reaper_transport::TransportError;
    pub use reaper_turn::TurnMetrics;
}
