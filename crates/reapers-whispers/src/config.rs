//! Server configuration from the environment.
//!
//! | Variable             | Meaning                         | Default          |
//! |----------------------|---------------------------------|------------------|
//! | `REAPER_BIND`        | listen address                  | `127.0.0.1:8080` |
//! | `REAPER_BOARD_SIZE`  | board side length (2..=16)      | 4                |
//! | `REAPER_MAX_PLAYERS` | session capacity                | 6                |
//! | `REAPER_TURN_SECS`   | turn length in seconds (> 0)    | 30               |
//! | `REAPER_POWER_UPS`   | pickups dealt per game          | 3                |
//! | `REAPER_PICKUP_MODE` | `instant` or `challenge`        | `instant`        |
//! | `REAPER_SEED`        | RNG seed for reproducible games | random           |
//!
//! Unset or blank variables keep their default. A value that does not
//! parse is an error rather than silently ignored.

use std::str::FromStr;
use std::time::Duration;

use reaper_grid::{MAX_SIZE, MIN_SIZE};
use reaper_session::{PickupMode, SessionConfig};

/// Listen address used when `REAPER_BIND` is unset.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// A configuration value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for the first variable that does not parse
    /// or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable
    /// name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let session = &mut config.session;

        if let Some(bind) = read(&lookup, "REAPER_BIND") {
            config.bind_addr = bind;
        }
        if let Some(size) = parse::<usize>(&lookup, "REAPER_BOARD_SIZE", "a board size from 2 to 16")? {
            if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
                return Err(invalid("REAPER_BOARD_SIZE", size, "a board size from 2 to 16"));
            }
            session.board_size = size;
        }
        if let Some(max) = parse::<usize>(&lookup, "REAPER_MAX_PLAYERS", "at least 2 players")? {
            if max < 2 {
                return Err(invalid("REAPER_MAX_PLAYERS", max, "at least 2 players"));
            }
            session.max_players = max;
        }
        if let Some(secs) = parse::<u64>(&lookup, "REAPER_TURN_SECS", "a positive number of seconds")? {
            if secs == 0 {
                return Err(invalid("REAPER_TURN_SECS", secs, "a positive number of seconds"));
            }
            session.turn_duration = Duration::from_secs(secs);
        }
        if let Some(count) = parse::<usize>(&lookup, "REAPER_POWER_UPS", "an unsigned integer")? {
            session.power_up_count = count;
        }
        if let Some(mode) = parse::<PickupMode>(&lookup, "REAPER_PICKUP_MODE", "instant or challenge")? {
            session.pickup_mode = mode;
        }
        if let Some(seed) = parse::<u64>(&lookup, "REAPER_SEED", "an unsigned integer")? {
            session.seed = Some(seed);
        }

        config.session = config.session.validated();
        Ok(config)
    }
}

/// The trimmed value of `var`, or `None` if unset or blank.
fn read(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match read(lookup, var) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| invalid(var, raw, expected)),
    }
}

fn invalid(var: &'static str, value: impl ToString, expected: &'static str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_addr, DEFAULT_BIND);
    }

    #[test]
    fn test_every_variable_is_read() {
        let config = from_pairs(&[
            ("REAPER_BIND", "0.0.0.0:9000"),
            ("REAPER_BOARD_SIZE", "6"),
            ("REAPER_MAX_PLAYERS", "8"),
            ("REAPER_TURN_SECS", "12"),
            ("REAPER_POWER_UPS", "5"),
            ("REAPER_PICKUP_MODE", "Challenge"),
            ("REAPER_SEED", "42"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.session.board_size, 6);
        assert_eq!(config.session.max_players, 8);
        assert_eq!(config.session.turn_duration, Duration::from_secs(12));
        assert_eq!(config.session.power_up_count, 5);
        assert_eq!(config.session.pickup_mode, PickupMode::Challenge);
        assert_eq!(config.session.seed, Some(42));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = from_pairs(&[("REAPER_BIND", "  "), ("REAPER_SEED", "")]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND);
        assert_eq!(config.session.seed, None);
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let err = from_pairs(&[("REAPER_TURN_SECS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "REAPER_TURN_SECS",
                value: "soon".into(),
                expected: "a positive number of seconds",
            }
        );
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(from_pairs(&[("REAPER_BOARD_SIZE", "1")]).is_err());
        assert!(from_pairs(&[("REAPER_BOARD_SIZE", "17")]).is_err());
        assert!(from_pairs(&[("REAPER_MAX_PLAYERS", "1")]).is_err());
        assert!(from_pairs(&[("REAPER_TURN_SECS", "0")]).is_err());
        assert!(from_pairs(&[("REAPER_PICKUP_MODE", "lottery")]).is_err());
    }

    #[test]
    fn test_capacity_is_clamped_to_board() {
        let config = from_pairs(&[("REAPER_BOARD_SIZE", "2"), ("REAPER_MAX_PLAYERS", "9")]).unwrap();
        assert_eq!(config.session.max_players, 4);
    }
}
