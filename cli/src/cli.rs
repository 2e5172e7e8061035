// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CLI Interface
//!
//! Defines the command-line argument structure for `qf-explorer` using
//! `clap` derive. Supports three subcommands: `watch`, `feed`, and
//! `version`. Every option can also be set through a `QFX_*` environment
//! variable.

use std::net::IpAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use quantumfuse_explorer::config::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_ENDPOINT, DEFAULT_EVENT_CHANNEL_CAPACITY,
    DEFAULT_FEED_BLOCK_INTERVAL_MS, DEFAULT_FEED_MAX_TRANSACTIONS, DEFAULT_FEED_PORT,
    DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_RETAINED_BLOCKS, DEFAULT_SEARCH_DEBOUNCE_MS,
};
use quantumfuse_explorer::{
    AmountLabel, ExplorerConfig, FeedConfig, ReconnectPolicy, TimestampUnit,
};

use crate::logging::LogFormat;

/// QuantumFuse real-time block explorer.
///
/// Connects to the realtime block feed, keeps a live newest-first block
/// list, filters it by transaction participant and summarizes block and
/// transaction charts.
#[derive(Parser, Debug)]
#[command(
    name = "qf-explorer",
    about = "QuantumFuse real-time block explorer",
    version,
    propagate_version = true
)]
pub struct ExplorerCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "QFX_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to a realtime feed and render the explorer view.
    ///
    /// Search terms are read from stdin, one per line. An empty line clears
    /// the search.
    Watch(WatchArgs),
    /// Serve a synthetic realtime feed for local development.
    Feed(FeedArgs),
    /// Print version information and exit.
    Version,
}

/// How the view is written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable block lists and chart summaries.
    Text,
    /// One JSON snapshot per line, charts in chart.js form.
    Json,
}

/// Arguments for the `watch` subcommand.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// WebSocket URL of the realtime feed.
    #[arg(long, short = 'e', env = "QFX_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Unit of the feed's `timestamp` field: seconds or millis.
    #[arg(long, env = "QFX_TIMESTAMP_UNIT", default_value = "millis")]
    pub timestamp_unit: TimestampUnit,

    /// Maximum number of blocks kept in memory.
    #[arg(long, env = "QFX_RETAINED_BLOCKS", default_value_t = DEFAULT_RETAINED_BLOCKS)]
    pub retained_blocks: usize,

    /// Quiet period in milliseconds before a search term is applied.
    /// Zero applies every line immediately.
    #[arg(long, env = "QFX_DEBOUNCE_MS", default_value_t = DEFAULT_SEARCH_DEBOUNCE_MS)]
    pub debounce_ms: u64,

    /// Amount chart labels: sender or sender-to-recipient.
    #[arg(long, env = "QFX_AMOUNT_LABEL", default_value = "sender-to-recipient")]
    pub amount_label: AmountLabel,

    /// Initial search term.
    #[arg(long, short = 's', default_value = "")]
    pub search: String,

    /// Reconnect attempts after a failed or closed connection.
    #[arg(long, env = "QFX_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Delay before the first reconnect, in milliseconds.
    #[arg(long, env = "QFX_INITIAL_BACKOFF_MS", default_value_t = DEFAULT_INITIAL_BACKOFF_MS)]
    pub initial_backoff_ms: u64,

    /// Upper bound on the reconnect delay, in milliseconds.
    #[arg(long, env = "QFX_MAX_BACKOFF_MS", default_value_t = DEFAULT_MAX_BACKOFF_MS)]
    pub max_backoff_ms: u64,

    /// Output format.
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Rows shown per list in text output.
    #[arg(long, default_value_t = 20)]
    pub max_rows: usize,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "QFX_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl WatchArgs {
    pub fn explorer_config(&self) -> ExplorerConfig {
        ExplorerConfig {
            endpoint: self.endpoint.clone(),
            timestamp_unit: self.timestamp_unit,
            retained_blocks: self.retained_blocks,
            search_debounce: Duration::from_millis(self.debounce_ms),
            amount_label: self.amount_label,
            reconnect: ReconnectPolicy {
                max_retries: self.max_retries,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.max_backoff_ms),
                multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            },
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Arguments for the `feed` subcommand.
#[derive(Args, Debug)]
pub struct FeedArgs {
    /// Address to bind.
    #[arg(long, env = "QFX_FEED_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind.
    #[arg(long, short = 'p', env = "QFX_FEED_PORT", default_value_t = DEFAULT_FEED_PORT)]
    pub port: u16,

    /// Milliseconds between generated blocks.
    #[arg(long, env = "QFX_FEED_INTERVAL_MS", default_value_t = DEFAULT_FEED_BLOCK_INTERVAL_MS)]
    pub interval_ms: u64,

    /// Maximum transactions per generated block.
    #[arg(long, default_value_t = DEFAULT_FEED_MAX_TRANSACTIONS)]
    pub max_transactions: usize,

    /// Unit written to the `timestamp` field: seconds or millis.
    #[arg(long, default_value = "millis")]
    pub timestamp_unit: TimestampUnit,

    /// Comma-separated participant addresses.
    #[arg(long, value_delimiter = ',')]
    pub participants: Vec<String>,

    /// RNG seed for a reproducible feed.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl FeedArgs {
    pub fn feed_config(&self) -> FeedConfig {
        let defaults = FeedConfig::default();
        FeedConfig {
            block_interval: Duration::from_millis(self.interval_ms),
            max_transactions: self.max_transactions,
            timestamp_unit: self.timestamp_unit,
            participants: if self.participants.is_empty() {
                defaults.participants
            } else {
                self.participants.clone()
            },
            seed: self.seed,
        }
    }
}
