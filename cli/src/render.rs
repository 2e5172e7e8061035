// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # View Rendering
//!
//! Turns a [`ViewSnapshot`] into stdout output. Text output shows the
//! newest blocks, the blocks matching the search term with their
//! transactions, and a summary of both chart series. JSON output writes
//! the whole snapshot on one line.
//!
//! A failed connection replaces the whole view with its error message.

use std::fmt::Write;

use chrono::SecondsFormat;

use quantumfuse_explorer::{Block, ChartSummary, ViewSnapshot, ViewStatus};

const LOADING: &str = "Loading...";

/// Renders `snapshot` as text, showing at most `max_rows` blocks per list.
pub fn render_text(snapshot: &ViewSnapshot<'_>, max_rows: usize) -> String {
    let status = match &snapshot.status {
        ViewStatus::Failed { message } => return format!("{message}\n"),
        ViewStatus::Loading => return format!("{LOADING}\n"),
        ViewStatus::Live => "live",
        ViewStatus::Reconnecting => "reconnecting",
        ViewStatus::Disconnected => "disconnected",
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{status}] {} blocks ({} received, {} evicted, {} rejected)",
        snapshot.blocks.len(),
        snapshot.total_received,
        snapshot.evicted,
        snapshot.rejected,
    );
    if let Some(reason) = &snapshot.last_rejection {
        let _ = writeln!(out, "last rejected frame: {reason}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Blocks");
    write_block_rows(&mut out, snapshot.blocks.iter().copied(), max_rows, false);

    let _ = writeln!(out);
    if snapshot.search_term.is_empty() {
        let _ = writeln!(out, "Transactions ({} blocks)", snapshot.filtered.len());
    } else {
        let _ = writeln!(
            out,
            "Transactions matching \"{}\" ({} blocks)",
            snapshot.search_term,
            snapshot.filtered.len()
        );
    }
    write_block_rows(
        &mut out,
        snapshot.filtered.iter().map(|b| &**b),
        max_rows,
        true,
    );

    let _ = writeln!(out);
    write_summary(&mut out, &snapshot.summary);
    out
}

/// Renders `snapshot` as a single JSON line.
pub fn render_json(snapshot: &ViewSnapshot<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string(snapshot)
}

fn write_block_rows<'a, I>(out: &mut String, blocks: I, max_rows: usize, with_transactions: bool)
where
    I: ExactSizeIterator<Item = &'a Block>,
{
    let total = blocks.len();
    if total == 0 {
        let _ = writeln!(out, "  (none)");
        return;
    }

    for block in blocks.take(max_rows) {
        let _ = writeln!(
            out,
            "  #{:<8} {}  {} tx",
            block.index,
            block.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            block.transaction_count(),
        );
        if with_transactions {
            for tx in &block.transactions {
                let _ = writeln!(
                    out,
                    "      {} -> {}  {:.2}",
                    tx.sender, tx.recipient, tx.amount
                );
            }
        }
    }
    if total > max_rows {
        let _ = writeln!(out, "  ... {} more", total - max_rows);
    }
}

fn write_summary(out: &mut String, summary: &ChartSummary) {
    match (
        summary.lowest_index,
        summary.highest_index,
        summary.earliest,
        summary.latest,
    ) {
        (Some(low), Some(high), Some(earliest), Some(latest)) => {
            let _ = writeln!(
                out,
                "Block Index: {} points, index {low}..{high}, {} to {}",
                summary.blocks,
                earliest.to_rfc3339_opts(SecondsFormat::Secs, true),
                latest.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
        _ => {
            let _ = writeln!(out, "Block Index: no points");
        }
    }

    match summary.largest_amount {
        Some(largest) => {
            let _ = writeln!(
                out,
                "Transaction Amount: {} points, total {:.2}, largest {:.2}",
                summary.transactions, summary.total_amount, largest,
            );
        }
        None => {
            let _ = writeln!(out, "Transaction Amount: no points");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use quantumfuse_explorer::{
        ConnectionState, ExplorerConfig, ExplorerView, StreamEvent, Transaction,
    };

    fn live_view() -> ExplorerView {
        let mut view = ExplorerView::new(&ExplorerConfig::default());
        view.apply(StreamEvent::State(ConnectionState::Connecting));
        view.apply(StreamEvent::State(ConnectionState::Connected));
        view.apply(StreamEvent::Block(Block::new(
            1,
            DateTime::from_timestamp(500, 0).unwrap(),
            vec![Transaction::new("C", "D", 3.0)],
        )));
        view.apply(StreamEvent::Block(Block::new(
            2,
            DateTime::from_timestamp(1_000, 0).unwrap(),
            vec![Transaction::new("A", "B", 5.0)],
        )));
        view
    }

    #[test]
    fn loading_before_first_connection() {
        let view = ExplorerView::new(&ExplorerConfig::default());
        assert_eq!(render_text(&view.snapshot(), 10), "Loading...\n");
    }

    #[test]
    fn error_replaces_the_view() {
        let mut view = live_view();
        view.apply(StreamEvent::State(ConnectionState::Error(
            "WebSocket connection error".into(),
        )));
        assert_eq!(
            render_text(&view.snapshot(), 10),
            "WebSocket connection error\n"
        );
    }

    #[test]
    fn live_view_lists_blocks_newest_first() {
        let view = live_view();
        let text = render_text(&view.snapshot(), 10);

        assert!(text.starts_with("[live] 2 blocks (2 received, 0 evicted, 0 rejected)"));
        let second = text.find("#2").unwrap();
        let first = text.find("#1").unwrap();
        assert!(second < first);
        assert!(text.contains("Transactions (2 blocks)"));
        assert!(text.contains("A -> B  5.00"));
        assert!(text.contains("Block Index: 2 points, index 1..2"));
        assert!(text.contains("Transaction Amount: 2 points, total 8.00, largest 5.00"));
    }

    #[test]
    fn search_term_narrows_transactions() {
        let mut view = live_view();
        view.set_search_term("C");
        let text = render_text(&view.snapshot(), 10);

        assert!(text.contains("Transactions matching \"C\" (1 blocks)"));
        assert!(text.contains("C -> D  3.00"));
        assert!(!text.contains("A -> B"));
    }

    #[test]
    fn rows_are_capped() {
        let view = live_view();
        let text = render_text(&view.snapshot(), 1);
        assert!(text.contains("... 1 more"));
    }

    #[test]
    fn json_is_one_line_with_status() {
        let view = live_view();
        let line = render_json(&view.snapshot()).unwrap();
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["status"], "live");
        assert_eq!(value["blocks"].as_array().unwrap().len(), 2);
        assert_eq!(value["blocks"][0]["index"], 2);
    }
}
