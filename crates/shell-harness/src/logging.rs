//! Tracing setup for test scripts.
//!
//! The harness only emits `tracing` events; nothing is printed unless a
//! subscriber is installed. Test scripts call [`init_logging`] first thing
//! in `main`.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `HARNESS_LOG` | filter directives, e.g. `shell_harness=debug` (falls back to `RUST_LOG`, then `warn`) |
//! | `HARNESS_LOG_FORMAT` | `text` (default) or `json` |

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Filter variable checked first.
pub const LOG_ENV: &str = "HARNESS_LOG";

/// Output format variable.
pub const LOG_FORMAT_ENV: &str = "HARNESS_LOG_FORMAT";

/// Filter used when neither `HARNESS_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "warn";

/// How log lines are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Install a stderr subscriber configured from the environment.
///
/// Safe to call more than once: if a global subscriber is already set the
/// call does nothing.
pub fn init_logging() {
    let lookup = |name: &str| std::env::var(name).ok();
    init_logging_with(&filter_directives(lookup), log_format(lookup));
}

/// Install a stderr subscriber with explicit settings.
pub fn init_logging_with(directives: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .json()
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if result.is_err() {
        tracing::trace!("global subscriber already installed");
    }
}

fn filter_directives<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(LOG_ENV)
        .or_else(|| lookup("RUST_LOG"))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn log_format<F>(lookup: F) -> LogFormat
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(LOG_FORMAT_ENV)
        .as_deref()
        .map(str::trim)
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}
