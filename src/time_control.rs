//! Time controls applied to agent calls.
//!
//! Three budgets bound a match:
//!
//! - **Per-turn cap**: hard deadline for a single move request.
//! - **Match bank**: total agent wall-clock a team may spend across the
//!   four games of a match. Elapsed request time is deducted whatever the
//!   outcome; an empty bank forfeits.
//! - **Setup window**: how long the runner probes both endpoints before
//!   game 1 before declaring the match dead.
//!
//! Build a [`TimeControl`] through the builder:
//!
//! ```
//! use std::time::Duration;
//! use c4_championship::time_control::TimeControlBuilder;
//!
//! let time = TimeControlBuilder::new()
//!     .with_per_turn_cap(Duration::from_secs(10))
//!     .with_match_bank(Duration::from_secs(240))
//!     .with_setup_window(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//! ```
//!
//! [`TimeControlBuilder::from_env()`] reads the same knobs from the
//! environment for deployment tuning.

use std::{env, time::Duration};

use anyhow::bail;

const DEFAULT_PER_TURN_CAP: Duration = Duration::from_secs(10);
const DEFAULT_MATCH_BANK: Duration = Duration::from_secs(240);
const DEFAULT_SETUP_WINDOW: Duration = Duration::from_secs(30);

/// Builder for [`TimeControl`].
///
/// Unset values fall back to the championship defaults: a 10 s per-turn
/// cap, a 240 s match bank per team and a 30 s setup window.
#[derive(Debug, Default)]
pub struct TimeControlBuilder {
    per_turn_cap: Option<Duration>,
    match_bank: Option<Duration>,
    setup_window: Option<Duration>,
}

impl TimeControlBuilder {
    /// Creates a builder with every value unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder configured from environment variables.
    ///
    /// Recognized variables, all optional:
    /// - `TURN_CAP_MS` (u64): per-turn cap in milliseconds
    /// - `MATCH_BANK_MS` (u64): per-team match bank in milliseconds
    /// - `SETUP_WINDOW_MS` (u64): setup window in milliseconds
    #[must_use]
    pub fn from_env() -> Self {
        fn parse_duration_millis(var: &str) -> Option<Duration> {
            env::var(var)
                .ok()?
                .parse::<u64>()
                .ok()
                .map(Duration::from_millis)
        }

        TimeControlBuilder {
            per_turn_cap: parse_duration_millis("TURN_CAP_MS"),
            match_bank: parse_duration_millis("MATCH_BANK_MS"),
            setup_window: parse_duration_millis("SETUP_WINDOW_MS"),
        }
    }

    /// Sets the hard deadline for a single move request.
    #[must_use]
    pub fn with_per_turn_cap(self, duration: Duration) -> Self {
        Self {
            per_turn_cap: Some(duration),
            ..self
        }
    }

    /// Sets the total agent wall-clock a team may spend per match.
    #[must_use]
    pub fn with_match_bank(self, duration: Duration) -> Self {
        Self {
            match_bank: Some(duration),
            ..self
        }
    }

    /// Sets the reachability window granted before game 1.
    #[must_use]
    pub fn with_setup_window(self, duration: Duration) -> Self {
        Self {
            setup_window: Some(duration),
            ..self
        }
    }

    /// Consumes the builder and returns the constructed `TimeControl`.
    ///
    /// # Errors
    /// Returns an error when a budget is zero or the per-turn cap exceeds
    /// the match bank (such a cap could never be reached).
    pub fn build(self) -> anyhow::Result<TimeControl> {
        let per_turn_cap = self.per_turn_cap.unwrap_or(DEFAULT_PER_TURN_CAP);
        let match_bank = self.match_bank.unwrap_or(DEFAULT_MATCH_BANK);
        let setup_window = self.setup_window.unwrap_or(DEFAULT_SETUP_WINDOW);

        if per_turn_cap.is_zero() || match_bank.is_zero() || setup_window.is_zero() {
            bail!("time budgets must be positive");
        }
        if per_turn_cap > match_bank {
            bail!(
                "per-turn cap ({per_turn_cap:?}) is greater than the match bank ({match_bank:?})"
            );
        }

        Ok(TimeControl {
            per_turn_cap,
            match_bank,
            setup_window,
        })
    }
}

/// Obtained using [`TimeControlBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl {
    pub(crate) per_turn_cap: Duration,
    pub(crate) match_bank: Duration,
    pub(crate) setup_window: Duration,
}

impl Default for TimeControl {
    fn default() -> Self {
        TimeControl {
            per_turn_cap: DEFAULT_PER_TURN_CAP,
            match_bank: DEFAULT_MATCH_BANK,
            setup_window: DEFAULT_SETUP_WINDOW,
        }
    }
}

impl TimeControl {
    /// Creates a `TimeControlBuilder`.
    pub fn builder() -> TimeControlBuilder {
        TimeControlBuilder::new()
    }

    /// Deadline for one move: the per-turn cap, clamped to what is left in
    /// the team's bank.
    pub(crate) fn turn_deadline(&self, bank_remaining: Duration) -> Duration {
        Duration::min(self.per_turn_cap, bank_remaining)
    }

    /// The configured per-turn cap.
    pub fn per_turn_cap(&self) -> Duration {
        self.per_turn_cap
    }

    /// The configured per-team match bank.
    pub fn match_bank(&self) -> Duration {
        self.match_bank
    }

    /// The configured setup window.
    pub fn setup_window(&self) -> Duration {
        self.setup_window
    }
}

#[cfg(test)]
mod time_control_tests {
    use super::*;

    #[test]
    fn defaults_match_the_championship_rules() {
        let time = TimeControlBuilder::new().build().unwrap();
        assert_eq!(time.per_turn_cap, Duration::from_secs(10));
        assert_eq!(time.match_bank, Duration::from_secs(240));
        assert_eq!(time.setup_window, Duration::from_secs(30));
    }

    #[test]
    fn turn_deadline_is_clamped_by_the_bank() {
        let time = TimeControl::default();
        assert_eq!(
            time.turn_deadline(Duration::from_secs(100)),
            Duration::from_secs(10)
        );
        assert_eq!(
            time.turn_deadline(Duration::from_secs(3)),
            Duration::from_secs(3)
        );
        assert_eq!(time.turn_deadline(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn cap_greater_than_bank_is_rejected() {
        let result = TimeControlBuilder::new()
            .with_per_turn_cap(Duration::from_secs(60))
            .with_match_bank(Duration::from_secs(30))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let result = TimeControlBuilder::new()
            .with_match_bank(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }
}
