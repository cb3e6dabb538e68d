//! Logging initialization.
//!
//! Structured logging via `tracing` with human-readable and JSON output,
//! verbosity from `-v` flags, and an override through
//! `MINIGAMES_LOG_LEVEL`. Logs always go to stderr; stdout belongs to the
//! NDJSON transport.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable that overrides the verbosity flags.
pub const LOG_LEVEL_ENV: &str = "MINIGAMES_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format with optional ANSI colors.
    #[default]
    Human,
    /// Newline-delimited JSON for machine consumption.
    Json,
}

/// Maps a verbosity level to a filter directive.
///
/// Dependencies stay at `warn`; only this crate gets louder.
///
/// - 0 → `warn`
/// - 1 → `minigames=info`
/// - 2 → `minigames=debug`
/// - 3+ → `minigames=trace` (saturates)
#[must_use]
pub const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,minigames=info",
        2 => "warn,minigames=debug",
        _ => "warn,minigames=trace",
    }
}

/// Initializes the global tracing subscriber.
///
/// `MINIGAMES_LOG_LEVEL`, when set and valid, wins over `verbosity`.
/// Uses `try_init()` so repeated calls (tests, embedding) are harmless.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));

    let show_target = verbosity >= 2;

    let use_ansi = match color {
        ColorChoice::Auto => {
            std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
        }
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(show_target)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Human => {
            let _ = builder.with_ansi(use_ansi).try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().with_current_span(false).try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default_is_human() {
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn init_logging_does_not_panic() {
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
        init_logging(LogFormat::Json, 3, ColorChoice::Never);
    }

    #[test]
    fn verbosity_directives() {
        assert_eq!(verbosity_to_directive(0), "warn");
        assert_eq!(verbosity_to_directive(1), "warn,minigames=info");
        assert_eq!(verbosity_to_directive(2), "warn,minigames=debug");
        assert_eq!(verbosity_to_directive(3), "warn,minigames=trace");
        assert_eq!(verbosity_to_directive(255), "warn,minigames=trace");
    }

    #[test]
    fn directives_parse() {
        for v in 0..4 {
            assert!(EnvFilter::try_new(verbosity_to_directive(v)).is_ok());
        }
    }
}
