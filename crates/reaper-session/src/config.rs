//! Session configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reaper_grid::{Cell, Grid, MAX_SIZE, MIN_SIZE};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Shortest turn a session will run.
pub const MIN_TURN_DURATION: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// PickupMode
// ---------------------------------------------------------------------------

/// What happens when a participant steps onto a power-up pickup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PickupMode {
    /// The power-up is granted on the spot.
    #[default]
    Instant,
    /// The participant must first solve a word challenge.
    Challenge,
}

impl FromStr for PickupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instant" => Ok(Self::Instant),
            "challenge" => Ok(Self::Challenge),
            other => Err(format!("unknown pickup mode {other:?}")),
        }
    }
}

impl fmt::Display for PickupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant => write!(f, "instant"),
            Self::Challenge => write!(f, "challenge"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings shared by every session a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Side length of the square board.
    pub board_size: usize,

    /// Roster capacity.
    pub max_players: usize,

    /// Participants required before the host may start.
    pub min_players: usize,

    /// How long each turn lasts before it rotates on its own.
    pub turn_duration: Duration,

    /// Pickup cells seeded at start.
    pub power_up_count: usize,

    /// Cells survivors must all stand on to win. Empty means the four
    /// corners of the board.
    pub goal_cells: Vec<Cell>,

    pub pickup_mode: PickupMode,

    /// Chat lines kept per session; older lines are dropped first.
    pub chat_history: usize,

    /// Fixes the random source of every session. `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_size: 4,
            max_players: 6,
            min_players: 2,
            turn_duration: Duration::from_secs(30),
            power_up_count: 3,
            goal_cells: Vec::new(),
            pickup_mode: PickupMode::Instant,
            chat_history: 200,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by [`Session::new`](crate::Session::new). Rules:
    /// - `board_size` clamped to the grid's supported range.
    /// - `min_players` at least 2, `max_players` at least `min_players`
    ///   and at most the number of cells.
    /// - Goal cells outside the board are dropped, duplicates removed.
    /// - `turn_duration` at least [`MIN_TURN_DURATION`].
    /// - `chat_history` at least 1.
    pub fn validated(mut self) -> Self {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.board_size) {
            warn!(board_size = self.board_size, "board size out of range, clamping");
            self.board_size = self.board_size.clamp(MIN_SIZE, MAX_SIZE);
        }
        let cells = self.board_size * self.board_size;
        self.min_players = self.min_players.max(2);
        self.max_players = self.max_players.max(self.min_players).min(cells);
        self.min_players = self.min_players.min(self.max_players);

        let before = self.goal_cells.len();
        self.goal_cells.retain(|&c| c < cells);
        self.goal_cells.sort_unstable();
        self.goal_cells.dedup();
        if self.goal_cells.len() != before {
            warn!(dropped = before - self.goal_cells.len(), "ignoring invalid goal cells");
        }

        if self.turn_duration < MIN_TURN_DURATION {
            warn!(turn_ms = self.turn_duration.as_millis(), "turn duration too short, clamping");
            self.turn_duration = MIN_TURN_DURATION;
        }

        self.chat_history = self.chat_history.max(1);
        self
    }

    /// The goal set for a board built from this config.
    pub fn goal_cells_for(&self, grid: &Grid) -> Vec<Cell> {
        if self.goal_cells.is_empty() {
            let mut corners = grid.corners().to_vec();
            corners.sort_unstable();
            corners.dedup();
            corners
        } else {
            self.goal_cells.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.board_size, 4);
        assert_eq!(config.max_players, 6);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.turn_duration, Duration::from_secs(30));
        assert_eq!(config.power_up_count, 3);
        assert_eq!(config.pickup_mode, PickupMode::Instant);
        assert_eq!(config.chat_history, 200);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_validated_clamps_board_and_capacity() {
        let config = SessionConfig {
            board_size: 40,
            min_players: 0,
            max_players: 1_000,
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.board_size, MAX_SIZE);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, MAX_SIZE * MAX_SIZE);
    }

    #[test]
    fn test_validated_drops_out_of_range_goals() {
        let config = SessionConfig {
            goal_cells: vec![15, 3, 99, 3],
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(config.goal_cells, vec![3, 15]);
    }

    #[test]
    fn test_validated_clamps_zero_turn_duration() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"turn_duration": {"secs": 0, "nanos": 0}}"#).unwrap();
        assert_eq!(config.turn_duration, Duration::ZERO);
        assert_eq!(config.validated().turn_duration, MIN_TURN_DURATION);

        let short = SessionConfig {
            turn_duration: Duration::from_millis(250),
            ..SessionConfig::default()
        }
        .validated();
        assert_eq!(short.turn_duration, MIN_TURN_DURATION);
        assert_eq!(
            SessionConfig::default().validated().turn_duration,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_goal_cells_default_to_corners() {
        let config = SessionConfig::default();
        let grid = Grid::new(4).unwrap();
        assert_eq!(config.goal_cells_for(&grid), vec![0, 3, 12, 15]);
    }

    #[test]
    fn test_pickup_mode_from_str() {
        assert_eq!("Challenge".parse::<PickupMode>(), Ok(PickupMode::Challenge));
        assert_eq!(" instant ".parse::<PickupMode>(), Ok(PickupMode::Instant));
        assert!("puzzle".parse::<PickupMode>().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"board_size": 6, "pickup_mode": "challenge"}"#).unwrap();
        assert_eq!(config.board_size, 6);
        assert_eq!(config.pickup_mode, PickupMode::Challenge);
        assert_eq!(config.max_players, 6);
    }
}
