//! Process-wide runtime configuration.
//!
//! The configuration is fixed the first time it is read. Call [`configure`]
//! before any other runtime operation to override it; otherwise it is read
//! from the environment:
//!
//! - `CLASSRT_ERROR_BUFFER`: capacity in bytes of each thread's error buffer.
//! - `CLASSRT_FATAL`: `abort` (default) or `panic`, the reaction to fatal
//!   runtime errors such as dispatching an unimplemented slot.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use classrt_log::warn;

use crate::error::{Error, Result};
use crate::report::DEFAULT_ERROR_BUFFER_SIZE;

/// Environment variable holding the error buffer capacity.
pub const ERROR_BUFFER_VAR: &str = "CLASSRT_ERROR_BUFFER";

/// Environment variable holding the fatal action.
pub const FATAL_VAR: &str = "CLASSRT_FATAL";

static CONFIG: OnceLock<Config> = OnceLock::new();

/// What the runtime does after logging a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalAction {
    /// Abort the process.
    #[default]
    Abort,
    /// Panic on the calling thread.
    Panic,
}

impl fmt::Display for FatalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalAction::Abort => write!(f, "abort"),
            FatalAction::Panic => write!(f, "panic"),
        }
    }
}

impl FromStr for FatalAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FatalAction::Abort),
            "panic" => Ok(FatalAction::Panic),
            other => Err(format!("unknown fatal action '{other}'")),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of bytes kept in a thread's error buffer. Longer
    /// messages are truncated.
    pub error_buffer_capacity: usize,
    /// Reaction to fatal runtime errors.
    pub fatal_action: FatalAction,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            error_buffer_capacity: DEFAULT_ERROR_BUFFER_SIZE,
            fatal_action: FatalAction::Abort,
        }
    }
}

impl Config {
    /// Builds a configuration from the environment, falling back to the
    /// defaults for unset or unparsable variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ERROR_BUFFER_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) => config.error_buffer_capacity = capacity,
                Err(err) => warn!(var = ERROR_BUFFER_VAR, value = %raw, %err, "ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(FATAL_VAR) {
            match raw.parse::<FatalAction>() {
                Ok(action) => config.fatal_action = action,
                Err(err) => warn!(var = FATAL_VAR, value = %raw, %err, "ignoring invalid value"),
            }
        }

        config
    }
}

/// Installs the process configuration.
///
/// # Errors
///
/// Returns [`Error::AlreadyConfigured`] if a configuration was installed or
/// already read.
pub fn configure(config: Config) -> Result<()> {
    CONFIG.set(config).map_err(|_| Error::AlreadyConfigured)
}

/// Returns the process configuration, reading it from the environment on
/// first use.
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}
