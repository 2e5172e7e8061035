// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # QuantumFuse Explorer: Stream Pipeline
//!
//! Client-side pipeline behind the QuantumFuse block explorer: a WebSocket
//! listener that ingests blocks from the realtime endpoint, a bounded
//! newest-first block list, a substring filter over transaction
//! participants, and projections into chart-ready datasets.
//!
//! ## Architecture
//!
//! ```text
//! listener ──StreamEvent──▶ view ──▶ { filter, chart } ──▶ snapshot
//!                            ▲
//! search (debounced term) ───┘
//! ```
//!
//! - **config**: Defaults, timestamp units, reconnect policy.
//! - **block**: Block/transaction model and the schema-checked decoder.
//! - **buffer**: Retention-windowed block list.
//! - **filter**: Sender/recipient substring search.
//! - **chart**: Block index and transaction amount series.
//! - **search**: Debounced search term input.
//! - **listener**: WebSocket client with a connection state machine.
//! - **view**: The explorer view model tying everything together.
//! - **feed**: Demo realtime feed server for local runs and tests.
//!
//! Everything derived (filtered blocks, chart series) is recomputed from
//! the block list and the search term on demand. The view holds no cached
//! projections.

pub mod block;
pub mod buffer;
pub mod chart;
pub mod config;
pub mod feed;
pub mod filter;
pub mod listener;
pub mod search;
pub mod view;

pub use block::{Block, BlockDecoder, DecodeError, Transaction, WireBlock};
pub use buffer::BlockList;
pub use chart::{AmountPoint, ChartData, ChartJsExport, ChartSummary, IndexPoint};
pub use config::{AmountLabel, ConfigError, ExplorerConfig, ReconnectPolicy, TimestampUnit};
pub use feed::{BlockGenerator, FeedConfig, FeedError, FeedServer};
pub use filter::{block_matches, filter_blocks};
pub use listener::{ConnectionState, ListenerError, ListenerHandle, StreamEvent, StreamListener};
pub use search::{SearchDebouncer, SearchInput};
pub use view::{ExplorerView, ViewSnapshot, ViewStatus, ViewUpdate};
