// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Explorer View Model
//!
//! Holds the only mutable session state: the block list, the settled
//! search term, the connection state and a couple of counters. Filtered
//! blocks and chart series are derived from the block list and the term
//! every time they are asked for, so they can never drift from their
//! inputs.
//!
//! The view is driven from one event loop. Listener events and search term
//! changes are applied in the order that loop receives them; nothing else
//! touches the view.

use std::sync::Arc;

use serde::Serialize;

use crate::block::{Block, DecodeError};
use crate::buffer::BlockList;
use crate::chart::{project, ChartData, ChartJsExport, ChartSummary};
use crate::config::{AmountLabel, ExplorerConfig};
use crate::filter::filter_blocks;
use crate::listener::{ConnectionState, StreamEvent};

/// What changed after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    BlockAdded { evicted: bool },
    StateChanged,
    Rejected,
}

/// Coarse status shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewStatus {
    /// First connection attempt still in flight.
    Loading,
    /// Connected and receiving.
    Live,
    /// A previous session ended; a new attempt is in flight.
    Reconnecting,
    /// The feed closed the connection and no retry is pending.
    Disconnected,
    /// Connection failed. The message replaces the whole view.
    Failed { message: String },
}

/// The explorer view model.
#[derive(Debug)]
pub struct ExplorerView {
    blocks: BlockList,
    search_term: String,
    amount_label: AmountLabel,
    state: ConnectionState,
    connection_attempts: u64,
    rejected: u64,
    last_rejection: Option<DecodeError>,
}

impl ExplorerView {
    pub fn new(config: &ExplorerConfig) -> Self {
        Self {
            blocks: BlockList::new(config.retained_blocks),
            search_term: String::new(),
            amount_label: config.amount_label,
            state: ConnectionState::Disconnected,
            connection_attempts: 0,
            rejected: 0,
            last_rejection: None,
        }
    }

    /// Applies one listener event.
    pub fn apply(&mut self, event: StreamEvent) -> ViewUpdate {
        match event {
            StreamEvent::Block(block) => {
                let evicted = self.blocks.prepend(block).is_some();
                ViewUpdate::BlockAdded { evicted }
            }
            StreamEvent::State(state) => {
                if state == ConnectionState::Connecting {
                    self.connection_attempts += 1;
                }
                self.state = state;
                ViewUpdate::StateChanged
            }
            StreamEvent::Rejected(err) => {
                self.rejected += 1;
                self.last_rejection = Some(err);
                ViewUpdate::Rejected
            }
        }
    }

    /// Replaces the search term. Returns `false` if it was already set.
    pub fn set_search_term(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        if term == self.search_term {
            return false;
        }
        self.search_term = term;
        true
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn blocks(&self) -> &BlockList {
        &self.blocks
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn connection_attempts(&self) -> u64 {
        self.connection_attempts
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    pub fn last_rejection(&self) -> Option<&DecodeError> {
        self.last_rejection.as_ref()
    }

    pub fn status(&self) -> ViewStatus {
        match &self.state {
            ConnectionState::Connected => ViewStatus::Live,
            ConnectionState::Error(message) => ViewStatus::Failed {
                message: message.clone(),
            },
            ConnectionState::Connecting if self.connection_attempts > 1 => {
                ViewStatus::Reconnecting
            }
            ConnectionState::Connecting => ViewStatus::Loading,
            ConnectionState::Disconnected if self.connection_attempts == 0 => {
                ViewStatus::Loading
            }
            ConnectionState::Disconnected => ViewStatus::Disconnected,
        }
    }

    /// Blocks matching the current search term, newest first.
    pub fn filtered(&self) -> Vec<Arc<Block>> {
        filter_blocks(self.blocks.iter(), &self.search_term)
    }

    /// Chart series for the current block list.
    pub fn charts(&self) -> ChartData {
        project(self.blocks.iter(), self.amount_label)
    }

    /// Everything a renderer needs, borrowed from the view.
    pub fn snapshot(&self) -> ViewSnapshot<'_> {
        let charts = self.charts();
        ViewSnapshot {
            status: self.status(),
            search_term: &self.search_term,
            blocks: self.blocks.iter().map(|b| &**b).collect(),
            filtered: self.filtered(),
            summary: charts.summary(),
            charts: charts.to_chartjs(),
            total_received: self.blocks.total_received(),
            evicted: self.blocks.evicted(),
            rejected: self.rejected,
            last_rejection: self.last_rejection.as_ref().map(|e| e.to_string()),
        }
    }
}

/// A render-ready view of the explorer at one point in time.
#[derive(Debug, Serialize)]
pub struct ViewSnapshot<'a> {
    #[serde(flatten)]
    pub status: ViewStatus,
    pub search_term: &'a str,
    pub blocks: Vec<&'a Block>,
    #[serde(serialize_with = "serialize_shared_blocks")]
    pub filtered: Vec<Arc<Block>>,
    pub summary: ChartSummary,
    pub charts: ChartJsExport,
    pub total_received: u64,
    pub evicted: u64,
    pub rejected: u64,
    pub last_rejection: Option<String>,
}

fn serialize_shared_blocks<S>(blocks: &[Arc<Block>], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(blocks.iter().map(|b| &**b))
}
