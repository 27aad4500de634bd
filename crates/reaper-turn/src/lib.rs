//! Turn coordination for Reaper's Whispers.
//!
//! Three small pieces that the session actor combines:
//!
//! - [`Turn`]: who may act, under which generation, until when.
//! - [`next_in_rotation`]: the next eligible roster index, wrapping.
//! - [`TurnClock`]: the single armed deadline of a session.
//!
//! # Generations
//!
//! Every new turn gets a generation strictly greater than the last one.
//! The clock only ever holds one `(generation, deadline)` pair and
//! [`TurnClock::arm`] replaces it wholesale, so a deadline belonging to an
//! older turn can never fire. The state machine also compares the
//! generation it receives against its own turn, so the guarantee holds
//! twice.
//!
//! # Integration
//!
//! The clock sits inside the session actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* apply command */ }
//!         expiry = clock.wait_for_expiry() => {
//!             let events = session.on_turn_timeout(expiry.generation);
//!         }
//!     }
//!     clock.follow(session.turn());
//! }
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reaper_protocol::{ParticipantId, TurnView};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace};

/// Stand-in deadline for durations too long to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// The active turn of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    /// The participant allowed to move. Always alive.
    pub holder: ParticipantId,
    /// Strictly increasing per session.
    pub generation: u64,
    /// Unix milliseconds when the turn began.
    pub started_at_ms: u64,
    pub duration: Duration,
}

impl Turn {
    /// Starts a turn now.
    pub fn begin(holder: ParticipantId, generation: u64, duration: Duration) -> Self {
        Self {
            holder,
            generation,
            started_at_ms: unix_millis(),
            duration,
        }
    }

    /// Unix milliseconds when the turn runs out.
    pub fn deadline_ms(&self) -> u64 {
        self.started_at_ms
            .saturating_add(millis(self.duration))
    }

    /// Wire form for snapshots.
    pub fn view(&self) -> TurnView {
        TurnView {
            participant_id: self.holder,
            generation: self.generation,
            started_at_ms: self.started_at_ms,
            duration_ms: millis(self.duration),
            deadline_ms: self.deadline_ms(),
        }
    }
}

/// `duration` in whole milliseconds, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Current wall-clock time in unix milliseconds.
///
/// Returns 0 if the system clock is before the epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Returns the first index after `from` (wrapping) for which `eligible`
/// holds.
///
/// Each index is visited at most once, `from` itself last. Returns `None`
/// when `len == 0` or nobody is eligible, so a roster where everyone is
/// eliminated can never spin.
///
/// ```
/// use reaper_turn::next_in_rotation;
///
/// let alive = [true, false, true];
/// assert_eq!(next_in_rotation(3, 0, |i| alive[i]), Some(2));
/// assert_eq!(next_in_rotation(3, 2, |i| alive[i]), Some(0));
/// ```
pub fn next_in_rotation(
    len: usize,
    from: usize,
    eligible: impl Fn(usize) -> bool,
) -> Option<usize> {
    (1..=len)
        .map(|step| (from + step) % len)
        .find(|&idx| eligible(idx))
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Delivered by [`TurnClock::wait_for_expiry`] when an armed deadline
/// passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnExpiry {
    pub generation: u64,
}

/// Counters for one session's clock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnMetrics {
    /// Deadlines armed.
    pub armed: u64,
    /// Deadlines that fired.
    pub expired: u64,
    /// Deadlines replaced or disarmed before they fired.
    pub cancelled: u64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    generation: u64,
    deadline: TokioInstant,
}

/// The one deadline a session may have outstanding.
///
/// One `TurnClock` per session actor.
#[derive(Debug, Default)]
pub struct TurnClock {
    armed: Option<Armed>,
    metrics: TurnMetrics,
}

impl TurnClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a deadline `duration` from now for `generation`, replacing
    /// any previous one.
    pub fn arm(&mut self, generation: u64, duration: Duration) {
        let now = TokioInstant::now();
        let deadline = now.checked_add(duration).unwrap_or(now + FAR_FUTURE);
        if let Some(prev) = self.armed.replace(Armed { generation, deadline }) {
            self.metrics.cancelled += 1;
            trace!(old = prev.generation, new = generation, "turn deadline replaced");
        }
        self.metrics.armed += 1;
        debug!(
            generation,
            duration_ms = millis(duration),
            "turn deadline armed"
        );
    }

    /// Drops the outstanding deadline, if any.
    ///
    /// Safe to call multiple times.
    pub fn disarm(&mut self) {
        if let Some(prev) = self.armed.take() {
            self.metrics.cancelled += 1;
            debug!(generation = prev.generation, "turn deadline disarmed");
        }
    }

    /// Brings the clock in line with the session's current turn: re-arms
    /// on a new generation, disarms when there is no turn, and leaves an
    /// already matching deadline alone.
    pub fn follow(&mut self, turn: Option<&Turn>) {
        match turn {
            Some(turn) if self.armed_generation() != Some(turn.generation) => {
                self.arm(turn.generation, turn.duration);
            }
            Some(_) => {}
            None => self.disarm(),
        }
    }

    /// Waits for the armed deadline and reports its generation.
    ///
    /// Resolves at most once per [`arm`](Self::arm): the clock is empty
    /// afterwards. While unarmed this future pends forever, which leaves
    /// `tokio::select!` free to serve its other branches. Dropping the
    /// future before it resolves leaves the deadline armed.
    pub async fn wait_for_expiry(&mut self) -> TurnExpiry {
        let Some(armed) = self.armed else {
            return std::future::pending::<TurnExpiry>().await;
        };

        time::sleep_until(armed.deadline).await;

        self.armed = None;
        self.metrics.expired += 1;
        debug!(generation = armed.generation, "turn deadline elapsed");
        TurnExpiry {
            generation: armed.generation,
        }
    }

    /// Generation of the outstanding deadline, if any.
    pub fn armed_generation(&self) -> Option<u64> {
        self.armed.map(|a| a.generation)
    }

    /// Whether a deadline is outstanding.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn metrics(&self) -> &TurnMetrics {
        &self.metrics
    }
}
