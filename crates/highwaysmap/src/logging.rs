//! Logging configuration for highwaysmap.
//!
//! Sets up the tracing subscriber used by the binary. HTTP request spans
//! from `tower_http` are enabled alongside the crate's own events.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding a bare level name (`DEBUG`, `info`, ...).
pub const LOGLEVEL_ENV: &str = "LOGLEVEL";

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Parse a bare level name such as the value of `LOGLEVEL`.
///
/// `WARNING` and `CRITICAL` are accepted as synonyms of warn and error.
#[must_use]
pub fn level_from_name(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "error" | "critical" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn default_filter(level: Level) -> String {
    format!("highwaysmap={level},tower_http={level}")
}

/// The level to log at when `RUST_LOG` isn't set.
///
/// Flags win; without them a valid `loglevel` applies.
fn effective_level(verbosity: Verbosity, loglevel: Option<&str>) -> Level {
    if verbosity == Verbosity::Normal {
        loglevel
            .and_then(level_from_name)
            .unwrap_or_else(|| verbosity.to_level_filter())
    } else {
        verbosity.to_level_filter()
    }
}

/// Initialize the logging system.
///
/// This should be called once at application startup. The logging level is
/// taken from, in order of precedence:
/// 1. The `RUST_LOG` environment variable (full filter syntax)
/// 2. The `verbosity` parameter, when set by flags
/// 3. The `LOGLEVEL` environment variable
///
/// # Examples
///
/// ```no_run
/// use highwaysmap::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let loglevel = std::env::var(LOGLEVEL_ENV).ok();
    let level = effective_level(verbosity, loglevel.as_deref());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // Ignore the error if a subscriber is already installed.
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_verbosity_default() {
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_level_from_name() {
        assert_eq!(level_from_name("DEBUG"), Some(Level::DEBUG));
        assert_eq!(level_from_name("info"), Some(Level::INFO));
        assert_eq!(level_from_name("WARNING"), Some(Level::WARN));
        assert_eq!(level_from_name("warn"), Some(Level::WARN));
        assert_eq!(level_from_name("CRITICAL"), Some(Level::ERROR));
        assert_eq!(level_from_name("trace"), Some(Level::TRACE));
        assert_eq!(level_from_name("loud"), None);
    }

    #[test]
    fn test_effective_level() {
        assert_eq!(
            effective_level(Verbosity::Normal, Some("warning")),
            Level::WARN
        );
        assert_eq!(effective_level(Verbosity::Normal, Some("loud")), Level::INFO);
        assert_eq!(effective_level(Verbosity::Normal, None), Level::INFO);
        assert_eq!(
            effective_level(Verbosity::Verbose, Some("warning")),
            Level::DEBUG
        );
        assert_eq!(effective_level(Verbosity::Quiet, Some("debug")), Level::ERROR);
    }

    #[test]
    fn test_default_filter() {
        assert_eq!(
            default_filter(Level::WARN),
            "highwaysmap=WARN,tower_http=WARN"
        );
    }

    #[test]
    fn test_init_logging_does_not_panic() {
        // Only the first call installs a subscriber; later calls are no-ops.
        init_logging(Verbosity::Normal);
        init_logging(Verbosity::Trace);
    }
}
