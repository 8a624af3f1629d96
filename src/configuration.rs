//! Config for the coordinator behaviors
//!
//! Configuration can be created programmatically using
//! [`Configuration::new()`] or by reading environment variables using
//! [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional:
//!
//! - `CHAMPIONSHIP_LOG_DIR` — Enable logging to a directory (must be a valid directory path)
//! - `CHAMPIONSHIP_MAX_PARALLEL` — Concurrent matches within a round (default: `5`)
//! - `CHAMPIONSHIP_MAX_TEAMS` — Roster cap (default: `20`)

use std::path::{Path, PathBuf};

/// Minimum roster size needed to start a championship.
pub const MIN_TEAMS: usize = 2;

/// Configuration for coordinator behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) max_parallel: usize,
    pub(crate) max_teams: usize,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - Logging is disabled (no log directory set).
    /// - Up to five matches of a round run concurrently.
    /// - The roster is capped at twenty teams.
    pub fn new() -> Self {
        Self {
            log_dir: None,
            max_parallel: 5,
            max_teams: 20,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the recognized variables. Any
    /// unset or unparseable value falls back to its default.
    pub fn from_env() -> Self {
        fn parse_usize(var: &str, default: usize) -> usize {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        let log_dir = std::env::var("CHAMPIONSHIP_LOG_DIR")
            .ok()
            .map(PathBuf::from)
            .filter(|p| p.is_dir());

        Self {
            log_dir,
            max_parallel: parse_usize("CHAMPIONSHIP_MAX_PARALLEL", 5).max(1),
            max_teams: parse_usize("CHAMPIONSHIP_MAX_TEAMS", 20).max(MIN_TEAMS),
        }
    }

    /// Enable logging to the given directory path.
    ///
    /// # Panics
    ///
    /// This method will panic if the provided path exists and is not a
    /// directory.
    pub fn with_log<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            std::fs::create_dir(path)
                .unwrap_or_else(|_| panic!("Could not create directory {}", path.display()));
        }

        if !path.is_dir() {
            panic!("Logging path must be a valid directory: {}", path.display());
        }

        self.log_dir = Some(path.to_path_buf());
        self
    }

    /// Sets how many matches of a round may run at the same time.
    ///
    /// Clamped to at least one.
    pub fn with_max_parallel(mut self, value: usize) -> Self {
        self.max_parallel = value.max(1);
        self
    }

    /// Sets the roster cap. Clamped to at least [`MIN_TEAMS`].
    pub fn with_max_teams(mut self, value: usize) -> Self {
        self.max_teams = value.max(MIN_TEAMS);
        self
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
