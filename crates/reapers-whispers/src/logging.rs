//! Structured logging setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global `tracing` subscriber.
///
/// Levels come from `RUST_LOG` (e.g. `RUST_LOG=reaper_session=debug`),
/// falling back to [`DEFAULT_FILTER`]. Returns `false` if a subscriber was
/// already installed, which makes it safe to call from tests.
///
/// ```no_run
/// reapers_whispers::init_logging();
/// tracing::info!("server starting");
/// ```
pub fn init_logging() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
