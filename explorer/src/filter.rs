// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Transaction participant search.
//!
//! A block matches a term when at least one of its transactions has the
//! term in its sender or recipient. Matching is a plain case-sensitive
//! substring test. The empty term selects every block, including blocks
//! that carry no transactions.

use std::sync::Arc;

use crate::block::Block;

/// Whether `block` belongs in the filtered view for `term`.
pub fn block_matches(block: &Block, term: &str) -> bool {
    term.is_empty() || block.transactions.iter().any(|tx| tx.involves(term))
}

/// Selects the matching blocks, preserving input order.
pub fn filter_blocks<'a, I>(blocks: I, term: &str) -> Vec<Arc<Block>>
where
    I: IntoIterator<Item = &'a Arc<Block>>,
{
    blocks
        .into_iter()
        .filter(|block| block_matches(block, term))
        .cloned()
        .collect()
}
