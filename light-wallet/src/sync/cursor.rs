//! Per-peer sync position.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{BlockHash, ChainTip, Height};

/// Sync state of one peer relationship.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Registered, nothing received yet.
    #[default]
    Idle,
    /// Behind the peer's tip, or replaying after a rollback.
    CatchingUp,
    /// At the peer's announced tip.
    Synced,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Idle => "idle",
            SyncState::CatchingUp => "catching_up",
            SyncState::Synced => "synced",
        };
        f.write_str(s)
    }
}

/// How far the ledger is synced against one peer.
///
/// `synced_height` never exceeds the highest block this peer delivered that
/// the ledger accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub synced_height: Height,
    pub synced_tip_hash: BlockHash,
    /// Highest tip the peer has announced.
    pub peer_tip_height: Height,
    pub state: SyncState,
    pub connected: bool,
}

impl SyncCursor {
    pub fn new() -> Self {
        Self {
            synced_height: 0,
            synced_tip_hash: BlockHash::all_zeros(),
            peer_tip_height: 0,
            state: SyncState::Idle,
            connected: true,
        }
    }

    pub fn synced_tip(&self) -> ChainTip {
        ChainTip {
            height: self.synced_height,
            hash: self.synced_tip_hash,
        }
    }

    /// Record that the peer's block `tip` is part of the ledger.
    pub fn advance_to(&mut self, tip: ChainTip) {
        if tip.height >= self.synced_height {
            self.synced_height = tip.height;
            self.synced_tip_hash = tip.hash;
        }
        self.peer_tip_height = self.peer_tip_height.max(tip.height);
        self.state = if self.synced_height >= self.peer_tip_height {
            SyncState::Synced
        } else {
            SyncState::CatchingUp
        };
    }

    /// Record a tip announcement.
    pub fn announce(&mut self, height: Height) {
        self.peer_tip_height = self.peer_tip_height.max(height);
        if self.synced_height < self.peer_tip_height {
            self.state = SyncState::CatchingUp;
        }
    }

    /// Pull the cursor back to `tip` after a rollback below it.
    pub fn clamp_to(&mut self, tip: ChainTip) {
        if self.synced_height > tip.height {
            self.synced_height = tip.height;
            self.synced_tip_hash = tip.hash;
            self.state = SyncState::CatchingUp;
        }
    }

    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synced
    }
}

impl Default for SyncCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip(height: Height) -> ChainTip {
        ChainTip {
            height,
            hash: BlockHash::hash(&height.to_le_bytes()),
        }
    }

    #[test]
    fn test_new_cursor_is_idle() {
        let cursor = SyncCursor::new();
        assert_eq!(cursor.state, SyncState::Idle);
        assert_eq!(cursor.synced_tip(), ChainTip::genesis());
        assert!(cursor.connected);
    }

    #[test]
    fn test_advance_and_announce() {
        let mut cursor = SyncCursor::new();
        cursor.announce(5);
        assert_eq!(cursor.state, SyncState::CatchingUp);

        cursor.advance_to(tip(3));
        assert_eq!(cursor.state, SyncState::CatchingUp);
        cursor.advance_to(tip(5));
        assert!(cursor.is_synced());
        assert_eq!(cursor.synced_tip(), tip(5));

        cursor.advance_to(tip(2));
        assert_eq!(cursor.synced_height, 5);
    }

    #[test]
    fn test_clamp_only_moves_down() {
        let mut cursor = SyncCursor::new();
        cursor.advance_to(tip(8));
        cursor.clamp_to(tip(4));
        assert_eq!(cursor.synced_tip(), tip(4));
        assert_eq!(cursor.state, SyncState::CatchingUp);

        cursor.clamp_to(tip(6));
        assert_eq!(cursor.synced_height, 4);
    }
}
