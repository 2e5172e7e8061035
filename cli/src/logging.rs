// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Explorer Logging
//!
//! Sets up `tracing` for `qf-explorer`. Connection state changes, rejected
//! frames and reconnect backoff are logged by the library under the
//! `quantumfuse_explorer` target; the binary logs startup and shutdown
//! under `qf_explorer`.
//!
//! Logs always go to stderr. In `watch` mode stdout carries the rendered
//! view (or one JSON snapshot per line), and mixing the two would break
//! anything consuming that output.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: both explorer crates and the demo
/// feed's HTTP trace layer at `info`.
pub const DEFAULT_FILTER: &str = "qf_explorer=info,quantumfuse_explorer=info,tower_http=info";

/// Selected with `--log-format` or `QFX_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Colored, with source locations. For a terminal next to the view.
    Pretty,
    /// One JSON object per line. For running `feed` or `watch` under a
    /// supervisor that collects stderr.
    Json,
}

/// Builds the filter: `RUST_LOG` when set and valid, `default_filter`
/// otherwise.
fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Installs the global subscriber. Call once, before the listener or feed
/// starts; a second call panics.
///
/// ```text
/// RUST_LOG=quantumfuse_explorer::listener=debug qf-explorer watch
/// ```
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter = env_filter(default_filter);

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_current_span(false),
                )
                .init();
        }
    }

    tracing::debug!(format = ?format, "logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_from_flag_values() {
        assert_eq!(LogFormat::from_str("pretty", false), Ok(LogFormat::Pretty));
        assert_eq!(LogFormat::from_str("json", false), Ok(LogFormat::Json));
        assert!(LogFormat::from_str("xml", false).is_err());
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
