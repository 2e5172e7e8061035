// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Explorer Configuration & Constants
//!
//! Every default the explorer relies on lives here: the realtime endpoint,
//! the debounce window, the retention window, the reconnect backoff curve
//! and the demo feed cadence. The CLI overrides them at runtime; nothing
//! else should hardcode these numbers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Stream Endpoint
// ---------------------------------------------------------------------------

/// The public realtime feed. Receive-only, no handshake beyond the upgrade.
pub const DEFAULT_ENDPOINT: &str = "wss://api.quantumfuse.com/v2/realtime";

/// Path the realtime feed is served on.
pub const REALTIME_PATH: &str = "/v2/realtime";

/// Human-readable error surfaced in place of the view when the connection
/// cannot be opened or breaks.
pub const CONNECTION_ERROR_MESSAGE: &str = "WebSocket connection error";

/// Capacity of the listener → view event channel. When the view falls this
/// far behind, the listener stops reading frames until it catches up.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// Quiet period before a typed search term is applied.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Same as [`DEFAULT_SEARCH_DEBOUNCE`], for CLI defaults that want a u64.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Number of blocks kept in memory. Older blocks fall off the tail.
pub const DEFAULT_RETAINED_BLOCKS: usize = 1_000;

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

/// Retries after the first failed connection. Zero keeps a failed session
/// failed.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Delay before the first retry, in milliseconds.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS);

/// Upper bound on the delay between retries, in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Upper bound on the delay between retries.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(DEFAULT_MAX_BACKOFF_MS);

/// A session that stays connected at least this long restores the full
/// retry budget. Shorter sessions count as failed attempts.
pub const STABLE_SESSION: Duration = Duration::from_secs(10);

/// Growth factor applied to the delay after each failed retry.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

// ---------------------------------------------------------------------------
// Demo Feed
// ---------------------------------------------------------------------------

/// Default port for `qf-explorer feed`.
pub const DEFAULT_FEED_PORT: u16 = 9750;

/// Time between synthetic blocks.
pub const DEFAULT_FEED_BLOCK_INTERVAL: Duration = Duration::from_secs(2);

/// Same as [`DEFAULT_FEED_BLOCK_INTERVAL`], in milliseconds.
pub const DEFAULT_FEED_BLOCK_INTERVAL_MS: u64 = 2_000;

/// Upper bound on transactions per synthetic block.
pub const DEFAULT_FEED_MAX_TRANSACTIONS: usize = 5;

/// Broadcast buffer per feed subscriber. Slower clients skip blocks.
pub const FEED_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown timestamp unit '{0}' (expected 'seconds' or 'millis')")]
    UnknownTimestampUnit(String),

    #[error("unknown amount label '{0}' (expected 'sender' or 'sender-to-recipient')")]
    UnknownAmountLabel(String),

    #[error("endpoint '{0}' must use the ws:// or wss:// scheme")]
    InvalidEndpoint(String),

    #[error("retention window must hold at least one block")]
    EmptyRetentionWindow,

    #[error("backoff multiplier must be at least 1")]
    InvalidBackoffMultiplier,
}

// ---------------------------------------------------------------------------
// TimestampUnit
// ---------------------------------------------------------------------------

/// Unit of the `timestamp` field on the wire.
///
/// Feeds disagree on whether they send seconds or milliseconds since the
/// epoch. The unit is applied once, in the decoder; everything downstream
/// works with `DateTime<Utc>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    Seconds,
    #[default]
    Millis,
}

impl TimestampUnit {
    /// Milliseconds per wire unit.
    pub fn millis_per_unit(self) -> f64 {
        match self {
            TimestampUnit::Seconds => 1_000.0,
            TimestampUnit::Millis => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimestampUnit::Seconds => "seconds",
            TimestampUnit::Millis => "millis",
        }
    }
}

impl fmt::Display for TimestampUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimestampUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "secs" | "seconds" => Ok(TimestampUnit::Seconds),
            "ms" | "millis" | "milliseconds" => Ok(TimestampUnit::Millis),
            other => Err(ConfigError::UnknownTimestampUnit(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// AmountLabel
// ---------------------------------------------------------------------------

/// How transactions are labelled on the amount chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmountLabel {
    /// Just the sender address.
    Sender,
    /// `sender -> recipient`.
    #[default]
    SenderToRecipient,
}

impl AmountLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            AmountLabel::Sender => "sender",
            AmountLabel::SenderToRecipient => "sender-to-recipient",
        }
    }
}

impl fmt::Display for AmountLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmountLabel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sender" => Ok(AmountLabel::Sender),
            "sender-to-recipient" | "route" => Ok(AmountLabel::SenderToRecipient),
            other => Err(ConfigError::UnknownAmountLabel(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// Retry-with-backoff policy for the stream listener.
///
/// The delay before retry `n` (1-based) is
/// `initial_backoff * multiplier^(n - 1)`, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries after the first attempt. Zero disables reconnecting.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the given retry. `attempt` starts at 1.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

// ---------------------------------------------------------------------------
// ExplorerConfig
// ---------------------------------------------------------------------------

/// Runtime configuration for one explorer session.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    /// `ws://` or `wss://` URL of the realtime feed.
    pub endpoint: String,

    /// Unit of the wire `timestamp` field.
    pub timestamp_unit: TimestampUnit,

    /// Maximum number of blocks kept in the block list.
    pub retained_blocks: usize,

    /// Quiet period before a search term is applied. Zero applies every
    /// update immediately.
    pub search_debounce: Duration,

    /// Label style for the transaction amount chart.
    pub amount_label: AmountLabel,

    /// What the listener does after a failed or closed connection.
    pub reconnect: ReconnectPolicy,

    /// Capacity of the listener → view event channel.
    pub event_channel_capacity: usize,
}

impl ExplorerConfig {
    /// Checks the values the rest of the pipeline assumes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.retained_blocks == 0 {
            return Err(ConfigError::EmptyRetentionWindow);
        }
        if self.reconnect.multiplier == 0 {
            return Err(ConfigError::InvalidBackoffMultiplier);
        }
        Ok(())
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timestamp_unit: TimestampUnit::default(),
            retained_blocks: DEFAULT_RETAINED_BLOCKS,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            amount_label: AmountLabel::default(),
            reconnect: ReconnectPolicy::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}
