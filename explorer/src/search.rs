// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Debounced search input.
//!
//! Every keystroke (or stdin line) goes into [`SearchInput::update`]. The
//! debouncer task publishes the latest term on a `watch` channel once no
//! further update has arrived for the quiet period. A zero quiet period
//! publishes each update as it arrives.
//!
//! Dropping the last [`SearchInput`] flushes any pending term and ends the
//! task.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Write side of the debouncer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SearchInput {
    tx: mpsc::UnboundedSender<String>,
}

impl SearchInput {
    /// Submits a new raw term. Returns `false` if the debouncer is gone.
    pub fn update(&self, term: impl Into<String>) -> bool {
        self.tx.send(term.into()).is_ok()
    }

    /// Gives up this handle. Once every clone is closed or dropped, the
    /// pending term is flushed and the task ends.
    pub fn close(self) {
        drop(self);
    }
}

pub struct SearchDebouncer;

impl SearchDebouncer {
    /// Spawns the debouncer task on the current runtime.
    ///
    /// The returned receiver starts out holding `initial`.
    pub fn spawn(quiet: Duration, initial: String) -> (SearchInput, watch::Receiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (term_tx, term_rx) = watch::channel(initial);

        tokio::spawn(debounce_loop(quiet, rx, term_tx));

        (SearchInput { tx }, term_rx)
    }
}

async fn debounce_loop(
    quiet: Duration,
    mut updates: mpsc::UnboundedReceiver<String>,
    published: watch::Sender<String>,
) {
    let mut pending: Option<String> = None;

    loop {
        match pending.take() {
            None => match updates.recv().await {
                Some(term) if quiet.is_zero() => publish(&published, term),
                Some(term) => pending = Some(term),
                None => break,
            },
            Some(term) => {
                tokio::select! {
                    next = updates.recv() => match next {
                        Some(newer) => pending = Some(newer),
                        None => {
                            publish(&published, term);
                            break;
                        }
                    },
                    _ = tokio::time::sleep(quiet) => publish(&published, term),
                }
            }
        }
    }

    debug!("search debouncer stopped");
}

fn publish(published: &watch::Sender<String>, term: String) {
    published.send_if_modified(|current| {
        if *current == term {
            false
        } else {
            debug!(term = %term, "search term settled");
            *current = term;
            true
        }
    });
}
