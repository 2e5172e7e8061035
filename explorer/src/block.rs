// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Block Model & Decoder
//!
//! The realtime feed pushes one JSON object per text frame:
//!
//! ```text
//! {
//!   "index": 42,
//!   "timestamp": 1718000000,
//!   "transactions": [
//!     { "sender": "qf1alice", "recipient": "qf1bob", "amount": 12.5 }
//!   ]
//! }
//! ```
//!
//! [`BlockDecoder`] is the only place that knows about the wire shape. It
//! checks the schema (required fields, integer index, numeric amounts),
//! converts the timestamp from the configured [`TimestampUnit`] into a UTC
//! instant and returns a classified [`DecodeError`] for anything else.
//! Unknown fields are ignored so the feed can grow without breaking us.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use thiserror::Error;

use crate::config::TimestampUnit;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A sender/recipient/amount triple. Nothing about it is validated: the
/// explorer displays what the feed says.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Whether `term` occurs in the sender or the recipient.
    ///
    /// Case-sensitive and unanchored. The empty term occurs everywhere.
    pub fn involves(&self, term: &str) -> bool {
        self.sender.contains(term) || self.recipient.contains(term)
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A block as the explorer sees it.
///
/// `index` is a display identifier only. Feeds restart numbering after a
/// reconnect, so two blocks in the list can share an index.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Block {
    pub index: i64,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(index: i64, timestamp: DateTime<Utc>, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            timestamp,
            transactions,
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Converts back to the wire shape, expressing the timestamp in `unit`.
    pub fn to_wire(&self, unit: TimestampUnit) -> WireBlock {
        WireBlock {
            index: self.index,
            timestamp: self.timestamp.timestamp_millis() as f64 / unit.millis_per_unit(),
            transactions: self.transactions.clone(),
        }
    }
}

/// The JSON object carried by one feed frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireBlock {
    pub index: i64,
    /// Seconds or milliseconds since the epoch, depending on the feed.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Why a frame could not become a [`Block`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The payload is not JSON at all, or is truncated.
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    InvalidJson {
        line: usize,
        column: usize,
        message: String,
    },

    /// Valid JSON that does not have the block shape (missing field, string
    /// where a number belongs, fractional index, ...).
    #[error("payload does not match the block schema: {0}")]
    Schema(String),

    /// The timestamp cannot be represented as a date.
    #[error("timestamp {raw} ({unit}) is outside the representable range")]
    TimestampOutOfRange { raw: f64, unit: TimestampUnit },

    /// A non-text frame arrived where JSON text was expected.
    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            Category::Data => DecodeError::Schema(e.to_string()),
            Category::Syntax | Category::Eof | Category::Io => DecodeError::InvalidJson {
                line: e.line(),
                column: e.column(),
                message: e.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// BlockDecoder
// ---------------------------------------------------------------------------

/// Turns feed frames into [`Block`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockDecoder {
    unit: TimestampUnit,
}

impl BlockDecoder {
    pub fn new(unit: TimestampUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> TimestampUnit {
        self.unit
    }

    /// Decodes one text frame.
    pub fn decode(&self, payload: &str) -> Result<Block, DecodeError> {
        let wire: WireBlock = serde_json::from_str(payload)?;
        self.decode_wire(wire)
    }

    /// Converts an already-parsed wire block.
    pub fn decode_wire(&self, wire: WireBlock) -> Result<Block, DecodeError> {
        let timestamp = self.to_datetime(wire.timestamp)?;
        Ok(Block {
            index: wire.index,
            timestamp,
            transactions: wire.transactions,
        })
    }

    /// Rounds to the nearest millisecond, so `x.123` seconds stays `x.123`
    /// despite binary floating point.
    fn to_datetime(&self, raw: f64) -> Result<DateTime<Utc>, DecodeError> {
        let out_of_range = DecodeError::TimestampOutOfRange {
            raw,
            unit: self.unit,
        };
        let millis = (raw * self.unit.millis_per_unit()).round();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return Err(out_of_range);
        }
        DateTime::from_timestamp_millis(millis as i64).ok_or(out_of_range)
    }
}
