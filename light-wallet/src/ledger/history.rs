//! Recent block history kept for rollbacks.
//!
//! For each of the most recent blocks the wallet remembers the block hash and
//! the local transactions that block confirmed, so a reorg can restore the
//! tip hash at the fork point and return orphaned confirmations to pending.

use std::collections::BTreeMap;

use crate::ledger::PendingTransaction;
use crate::types::{BlockHash, ChainTip, Height};

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockEntry {
    hash: BlockHash,
    confirmed: Vec<PendingTransaction>,
}

/// Sliding window of recently applied blocks.
#[derive(Debug, Clone)]
pub struct BlockHistory {
    entries: BTreeMap<Height, BlockEntry>,
    max_depth: u32,
}

impl BlockHistory {
    pub fn new(max_depth: u32) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_depth,
        }
    }

    /// Remember an applied block and prune entries older than the window.
    pub fn record_block(&mut self, height: Height, hash: BlockHash, confirmed: Vec<PendingTransaction>) {
        self.entries.insert(
            height,
            BlockEntry {
                hash,
                confirmed,
            },
        );
        if let Some(floor) = height.checked_sub(self.max_depth) {
            self.entries = self.entries.split_off(&floor);
        }
    }

    /// Hash at `height`, if retained. Genesis is always known.
    pub fn hash_at(&self, height: Height) -> Option<BlockHash> {
        if height == 0 {
            return Some(BlockHash::all_zeros());
        }
        self.entries.get(&height).map(|e| e.hash)
    }

    /// The oldest retained block, or genesis when nothing is retained.
    pub fn checkpoint(&self) -> ChainTip {
        self.entries
            .first_key_value()
            .map(|(height, entry)| ChainTip {
                height: *height,
                hash: entry.hash,
            })
            .unwrap_or_else(ChainTip::genesis)
    }

    /// Lowest fork height a rollback can be applied from.
    pub fn min_fork_height(&self) -> Height {
        match self.entries.first_key_value() {
            Some((height, _)) if *height > 1 => height + 1,
            _ => 1,
        }
    }

    /// Drop every entry at or above `fork_height` and return their confirmations,
    /// highest block first.
    pub fn truncate_from(&mut self, fork_height: Height) -> Vec<PendingTransaction> {
        let orphaned = self.entries.split_off(&fork_height);
        orphaned.into_values().rev().flat_map(|e| e.confirmed.into_iter().rev()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(h: Height) -> BlockHash {
        BlockHash::hash(&h.to_le_bytes())
    }

    #[test]
    fn test_window_is_pruned() {
        let mut history = BlockHistory::new(3);
        for h in 1..=10 {
            history.record_block(h, hash(h), Vec::new());
        }
        assert_eq!(history.len(), 4);
        assert_eq!(history.checkpoint().height, 7);
        assert_eq!(history.hash_at(6), None);
        assert_eq!(history.hash_at(7), Some(hash(7)));
        assert_eq!(history.min_fork_height(), 8);
    }

    #[test]
    fn test_genesis_always_known() {
        let history = BlockHistory::new(3);
        assert_eq!(history.hash_at(0), Some(BlockHash::all_zeros()));
        assert_eq!(history.checkpoint(), ChainTip::genesis());
        assert_eq!(history.min_fork_height(), 1);
    }

    #[test]
    fn test_unpruned_history_allows_fork_at_one() {
        let mut history = BlockHistory::new(100);
        for h in 1..=5 {
            history.record_block(h, hash(h), Vec::new());
        }
        assert_eq!(history.min_fork_height(), 1);
    }

    #[test]
    fn test_truncate_from() {
        let mut history = BlockHistory::new(10);
        for h in 1..=5 {
            history.record_block(h, hash(h), Vec::new());
        }
        assert!(history.truncate_from(3).is_empty());
        assert_eq!(history.len(), 2);
        assert_eq!(history.hash_at(3), None);
        assert_eq!(history.hash_at(2), Some(hash(2)));
    }
}
