// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Newest-first block list with a fixed retention window.
//!
//! New blocks go to the front. Once the list holds `capacity` blocks, each
//! new block pushes the oldest one off the back. Entries are shared as
//! `Arc<Block>` and never mutated after insertion, so snapshots taken
//! before a prepend stay valid.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::block::Block;

#[derive(Debug, Clone)]
pub struct BlockList {
    blocks: VecDeque<Arc<Block>>,
    capacity: usize,
    total_received: u64,
    evicted: u64,
}

impl BlockList {
    /// Creates an empty list that keeps at most `capacity` blocks.
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            blocks: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
            total_received: 0,
            evicted: 0,
        }
    }

    /// Puts `block` at position 0. Returns the block that fell off the
    /// back, if the window was full.
    pub fn prepend(&mut self, block: Block) -> Option<Arc<Block>> {
        self.blocks.push_front(Arc::new(block));
        self.total_received += 1;

        if self.blocks.len() > self.capacity {
            self.evicted += 1;
            self.blocks.pop_back()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently received block.
    pub fn latest(&self) -> Option<&Arc<Block>> {
        self.blocks.front()
    }

    pub fn get(&self, position: usize) -> Option<&Arc<Block>> {
        self.blocks.get(position)
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Block>> {
        self.blocks.iter()
    }

    /// Cheap copy of the current contents, newest first.
    pub fn snapshot(&self) -> Vec<Arc<Block>> {
        self.blocks.iter().cloned().collect()
    }

    /// Blocks received over the lifetime of the list, evicted ones included.
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Blocks dropped by the retention window.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Transaction;
    use chrono::DateTime;

    fn block(index: i64) -> Block {
        Block::new(
            index,
            DateTime::from_timestamp(1_700_000_000 + index, 0).unwrap(),
            vec![Transaction::new("a", "b", index as f64)],
        )
    }

    #[test]
    fn prepend_puts_new_block_first() {
        let mut list = BlockList::new(10);
        list.prepend(block(1));
        list.prepend(block(2));
        list.prepend(block(3));

        let order: Vec<i64> = list.iter().map(|b| b.index).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(list.latest().unwrap().index, 3);
    }

    #[test]
    fn prepend_leaves_existing_entries_untouched() {
        let mut list = BlockList::new(10);
        list.prepend(block(1));
        let before = list.snapshot();

        list.prepend(block(2));

        assert!(Arc::ptr_eq(&before[0], list.get(1).unwrap()));
        assert_eq!(*before[0], block(1));
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut list = BlockList::new(2);
        assert!(list.prepend(block(1)).is_none());
        assert!(list.prepend(block(2)).is_none());

        let evicted = list.prepend(block(3)).expect("window is full");
        assert_eq!(evicted.index, 1);

        let order: Vec<i64> = list.iter().map(|b| b.index).collect();
        assert_eq!(order, vec![3, 2]);
        assert_eq!(list.total_received(), 3);
        assert_eq!(list.evicted(), 1);
    }

    #[test]
    fn zero_capacity_keeps_one_block() {
        let mut list = BlockList::new(0);
        list.prepend(block(1));
        list.prepend(block(2));
        assert_eq!(list.capacity(), 1);
        assert_eq!(list.len(), 1);
        assert_eq!(list.latest().unwrap().index, 2);
    }

    #[test]
    fn duplicate_indexes_are_kept() {
        let mut list = BlockList::new(10);
        list.prepend(block(1));
        list.prepend(block(1));
        assert_eq!(list.len(), 2);
    }
}
