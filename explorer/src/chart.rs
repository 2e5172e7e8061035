// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Chart Projection
//!
//! Two datasets are derived from the block list:
//!
//! - **Block index**: one point per block, x = block time, y = index.
//!   Points follow list order (newest first); they are not sorted by time.
//! - **Transaction amount**: one bar per transaction, flattened in block
//!   order and then transaction order, labelled per [`AmountLabel`].
//!
//! No aggregation, bucketing or currency normalization happens here. The
//! projection is a pure function of the list, so calling it twice on the
//! same blocks yields the same data.
//!
//! [`ChartData::to_chartjs`] emits the `{ labels, datasets }` shape that
//! chart.js line/bar charts consume, with the dataset names and colours
//! the web explorer used.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::block::{Block, Transaction};
use crate::config::AmountLabel;

pub const BLOCK_INDEX_DATASET: &str = "Block Index";
pub const TRANSACTION_AMOUNT_DATASET: &str = "Transaction Amount";

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPoint {
    pub timestamp: DateTime<Utc>,
    pub index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmountPoint {
    pub label: String,
    pub amount: f64,
}

/// Both chart series for one block list.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChartData {
    pub index_series: Vec<IndexPoint>,
    pub amount_series: Vec<AmountPoint>,
}

impl AmountLabel {
    /// The x-axis label for `tx`.
    pub fn label_for(self, tx: &Transaction) -> String {
        match self {
            AmountLabel::Sender => tx.sender.clone(),
            AmountLabel::SenderToRecipient => format!("{} -> {}", tx.sender, tx.recipient),
        }
    }
}

/// Projects `blocks` (newest first) into chart series.
pub fn project<'a, I>(blocks: I, label: AmountLabel) -> ChartData
where
    I: IntoIterator<Item = &'a Arc<Block>>,
{
    let mut data = ChartData::default();

    for block in blocks {
        data.index_series.push(IndexPoint {
            timestamp: block.timestamp,
            index: block.index,
        });
        data.amount_series
            .extend(block.transactions.iter().map(|tx| AmountPoint {
                label: label.label_for(tx),
                amount: tx.amount,
            }));
    }

    data
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Headline numbers for a text rendering of the charts.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChartSummary {
    pub blocks: usize,
    pub transactions: usize,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub lowest_index: Option<i64>,
    pub highest_index: Option<i64>,
    pub total_amount: f64,
    pub largest_amount: Option<f64>,
}

impl ChartData {
    pub fn summary(&self) -> ChartSummary {
        let largest_amount = self
            .amount_series
            .iter()
            .map(|p| p.amount)
            .fold(None, |acc: Option<f64>, a| Some(acc.map_or(a, |m| m.max(a))));

        ChartSummary {
            blocks: self.index_series.len(),
            transactions: self.amount_series.len(),
            earliest: self.index_series.iter().map(|p| p.timestamp).min(),
            latest: self.index_series.iter().map(|p| p.timestamp).max(),
            lowest_index: self.index_series.iter().map(|p| p.index).min(),
            highest_index: self.index_series.iter().map(|p| p.index).max(),
            total_amount: self.amount_series.iter().map(|p| p.amount).sum(),
            largest_amount,
        }
    }

    /// Renders both series in chart.js `data` form.
    pub fn to_chartjs(&self) -> ChartJsExport {
        let block_index = ChartJsData {
            labels: self.index_series.iter().map(|p| p.timestamp).collect(),
            datasets: vec![ChartJsDataset {
                label: BLOCK_INDEX_DATASET,
                data: self.index_series.iter().map(|p| p.index).collect(),
                style: DatasetStyle::line(),
            }],
        };

        let transaction_amounts = ChartJsData {
            labels: self.amount_series.iter().map(|p| p.label.clone()).collect(),
            datasets: vec![ChartJsDataset {
                label: TRANSACTION_AMOUNT_DATASET,
                data: self.amount_series.iter().map(|p| p.amount).collect(),
                style: DatasetStyle::bar(),
            }],
        };

        ChartJsExport {
            block_index,
            transaction_amounts,
        }
    }
}

// ---------------------------------------------------------------------------
// chart.js export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartJsExport {
    pub block_index: ChartJsData<DateTime<Utc>, i64>,
    pub transaction_amounts: ChartJsData<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartJsData<L, T> {
    pub labels: Vec<L>,
    pub datasets: Vec<ChartJsDataset<T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartJsDataset<T> {
    pub label: &'static str,
    pub data: Vec<T>,
    #[serde(flatten)]
    pub style: DatasetStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStyle {
    pub border_color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_width: Option<u32>,
}

impl DatasetStyle {
    fn line() -> Self {
        Self {
            border_color: "rgb(75, 192, 192)",
            background_color: None,
            fill: Some(false),
            tension: Some(0.1),
            border_width: None,
        }
    }

    fn bar() -> Self {
        Self {
            border_color: "rgba(75, 192, 192, 1)",
            background_color: Some("rgba(75, 192, 192, 0.2)"),
            fill: None,
            tension: None,
            border_width: Some(1),
        }
    }
}
