//! Logging setup for the `classrt` crates.
//!
//! The runtime crates log through [`tracing`]. This crate re-exports the
//! macros they use and installs a formatting subscriber for binaries and
//! tests that want to see the output.
//!
//! The filter is taken from `CLASSRT_LOG`, then `RUST_LOG`, then the level
//! passed to [`init_with_level`] (default [`Level::Info`]).
//!
//! # Example
//!
//! ```
//! use classrt_log::{Level, info};
//!
//! classrt_log::init_with_level(Level::Debug);
//!
//! let class = "Circle";
//! info!(class, "initialized");
//! ```

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

pub use tracing::{debug, error, info, trace, warn};

/// Environment variable consulted first for the log filter.
pub const ENV_VAR: &str = "CLASSRT_LOG";

/// Log levels, ordered from most severe (Error) to least severe (Trace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Critical failures.
    Error = 0,
    /// Reported warnings and suspicious conditions.
    Warn = 1,
    /// Informational messages.
    Info = 2,
    /// Class initialization, frees, construction failures.
    Debug = 3,
    /// Per-block allocation and dispatch detail.
    Trace = 4,
}

impl Level {
    /// Returns the string representation of this log level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    /// Converts to the `tracing` filter accepting this level and above.
    #[must_use]
    pub const fn to_filter(self) -> LevelFilter {
        match self {
            Level::Error => LevelFilter::ERROR,
            Level::Warn => LevelFilter::WARN,
            Level::Info => LevelFilter::INFO,
            Level::Debug => LevelFilter::DEBUG,
            Level::Trace => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid log level: {}", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

fn build_filter(default: Level) -> EnvFilter {
    if let Ok(spec) = std::env::var(ENV_VAR) {
        if let Ok(filter) = EnvFilter::try_new(&spec) {
            return filter;
        }
    }

    EnvFilter::builder()
        .with_default_directive(default.to_filter().into())
        .from_env_lossy()
}

/// Installs the global subscriber at [`Level::Info`].
///
/// Returns `false` if a subscriber was already installed.
pub fn init() -> bool {
    init_with_level(Level::Info)
}

/// Installs the global subscriber with `level` as the fallback filter.
///
/// Returns `false` if a subscriber was already installed; the existing one
/// is kept.
pub fn init_with_level(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_target(true)
        .compact()
        .try_init()
        .is_ok()
}

/// Installs a subscriber that writes through the test harness capture.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(Level::Debug))
        .with_test_writer()
        .try_init();
}
