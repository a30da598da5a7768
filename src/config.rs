//! TOML settings for a solve.
//!
//! A settings file bounds the search (wall-clock seconds, search steps),
//! asks for a number of ranked rosters and fixes the seed that shuffles
//! resident order on alternate attempts. Every table and key is optional.
//!
//! ```
//! use u_rotation::config::SolverConfig;
//! use std::time::Duration;
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     random_seed = 7
//!
//!     [termination]
//!     seconds_spent_limit = 120
//!
//!     [search]
//!     solutions = 3
//! "#).unwrap();
//!
//! assert_eq!(config.time_limit(), Some(Duration::from_secs(120)));
//! assert_eq!(config.search.solutions, 3);
//! ```
//!
//! A missing settings file is an error from [`SolverConfig::load`]; callers
//! that treat it as optional fall back to the defaults:
//!
//! ```
//! use u_rotation::config::SolverConfig;
//!
//! let config = SolverConfig::load("rotation-settings.toml").unwrap_or_default();
//! assert_eq!(config.search.solutions, 1);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a settings file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unusable settings: {0}")]
    Invalid(String),
}

/// Settings for one solve.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SolverConfig {
    /// Seed for the resident shuffle of attempts after the first.
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// When to stop searching.
    #[serde(default)]
    pub termination: TerminationConfig,

    /// How many rosters to rank and how hard to search for each.
    #[serde(default)]
    pub search: SearchConfig,
}

impl SolverConfig {
    /// Default settings: unbounded search, one roster, seed zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and parses a settings file.
    ///
    /// # Errors
    /// [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`SolverConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses settings text and checks it.
    ///
    /// # Errors
    /// [`ConfigError::Toml`] for malformed text, [`ConfigError::Invalid`]
    /// when [`SolverConfig::validate`] fails.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the solver cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.solutions == 0 {
            return Err(ConfigError::Invalid(
                "search.solutions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Stops the search after `seconds` of wall-clock time.
    pub fn with_termination_seconds(mut self, seconds: u64) -> Self {
        self.termination.seconds_spent_limit = Some(seconds);
        self
    }

    /// Stops the search after `steps` search steps.
    pub fn with_step_limit(mut self, steps: u64) -> Self {
        self.termination.step_count_limit = Some(steps);
        self
    }

    /// Ranks up to `solutions` rosters; zero is raised to one.
    pub fn with_solutions(mut self, solutions: usize) -> Self {
        self.search.solutions = solutions.max(1);
        self
    }

    /// Fixes the shuffle seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Wall-clock bound, when one is set.
    pub fn time_limit(&self) -> Option<Duration> {
        self.termination.time_limit()
    }

    /// Seed in effect; zero when none is configured.
    pub fn seed(&self) -> u64 {
        self.random_seed.unwrap_or(0)
    }
}

/// Search bounds; each is off when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TerminationConfig {
    /// Wall-clock seconds for the whole solve.
    #[serde(default)]
    pub seconds_spent_limit: Option<u64>,

    /// Search steps shared by every attempt.
    #[serde(default)]
    pub step_count_limit: Option<u64>,
}

impl TerminationConfig {
    /// `seconds_spent_limit` as a duration.
    pub fn time_limit(&self) -> Option<Duration> {
        self.seconds_spent_limit.map(Duration::from_secs)
    }
}

/// Roster count and per-resident search effort.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SearchConfig {
    /// Distinct rosters to rank; each comes from its own attempt.
    pub solutions: usize,

    /// Backtracks allowed per terminal-year resident before the best plan
    /// seen is kept.
    pub max_backtracks_per_resident: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            solutions: 1,
            max_backtracks_per_resident: 64,
        }
    }
}
