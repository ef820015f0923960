//! Interfaces to the chain: what full-node peers deliver and how rewards are scheduled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NetworkResult;
use crate::ledger::{Record, RecordKind};
use crate::types::{Amount, BlockHash, ChainTip, Height, Identity, PeerId, RecordId, TxId};

/// Per-height reward schedule, supplied by the chain implementation.
pub trait RewardSchedule: Send + Sync {
    /// Returns `(base_fee, block_reward)` paid by the block at `height`.
    fn reward(&self, height: Height) -> (Amount, Amount);

    /// Total value paid to the farmer of the block at `height`.
    fn total(&self, height: Height) -> Amount {
        let (base_fee, block_reward) = self.reward(height);
        base_fee.saturating_add(block_reward)
    }
}

/// A record created by a block, as announced by the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordNotice {
    pub id: RecordId,
    pub amount: Amount,
    pub kind: RecordKind,
    pub owner: Identity,
}

impl RecordNotice {
    /// Unspent record created at `height`.
    pub fn to_record(&self, height: Height) -> Record {
        Record::new(self.id, self.amount, height, self.kind, self.owner)
    }
}

/// A block as delivered by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNotification {
    pub height: Height,
    pub hash: BlockHash,
    /// Records created by this block.
    pub records: Vec<RecordNotice>,
    /// Transactions included in this block.
    pub confirmed_tx_ids: Vec<TxId>,
}

impl BlockNotification {
    pub fn tip(&self) -> ChainTip {
        ChainTip {
            height: self.height,
            hash: self.hash,
        }
    }
}

/// A peer's instruction to abandon blocks at and above `fork_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgNotice {
    pub fork_height: Height,
    pub new_tip_height: Height,
    pub new_tip_hash: BlockHash,
}

impl ReorgNotice {
    pub fn new_tip(&self) -> ChainTip {
        ChainTip {
            height: self.new_tip_height,
            hash: self.new_tip_hash,
        }
    }
}

/// Events pushed by a peer over its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Block(BlockNotification),
    Reorg(ReorgNotice),
    /// The peer announced a new tip without sending the block.
    Tip(ChainTip),
}

/// Pull access to a peer's chain, used for catch-up and reorg replay.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// The peer this source reads from.
    fn peer_id(&self) -> PeerId;

    /// The peer's current tip.
    async fn tip(&self) -> NetworkResult<ChainTip>;

    /// The peer's block at `height`.
    async fn block_at(&self, height: Height) -> NetworkResult<BlockNotification>;
}
