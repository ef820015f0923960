//! Wallet ledger: record store, pending transactions and chain position.
//!
//! All ledger state lives behind one `tokio::sync::RwLock`. Mutations take the
//! write lock for their whole duration and validate before they change
//! anything, so readers never observe a half-applied block or rollback.

mod history;
mod maturity;
mod pending;
mod record;
mod store;

pub use history::BlockHistory;
pub use maturity::MaturityRules;
pub use pending::{PendingSet, PendingTransaction};
pub use record::{Record, RecordKind, RecordStatus};
pub use store::{RecordStore, StoreRollback};

use std::collections::HashSet;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::balance::{self, WalletBalance};
use crate::builder::SignedTransaction;
use crate::chain::BlockNotification;
use crate::config::WalletConfig;
use crate::error::{SyncError, SyncResult, WalletError, WalletResult};
use crate::types::{Amount, BlockHash, ChainTip, Height, Identity, RecordId, TxId};

/// Everything the ledger lock protects.
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub store: RecordStore,
    pub pending: PendingSet,
    pub tip: ChainTip,
    pub history: BlockHistory,
    pub identities: HashSet<Identity>,
}

impl LedgerState {
    fn new(max_reorg_depth: u32) -> Self {
        Self {
            store: RecordStore::new(),
            pending: PendingSet::default(),
            tip: ChainTip::genesis(),
            history: BlockHistory::new(max_reorg_depth),
            identities: HashSet::new(),
        }
    }

    pub fn is_own(&self, identity: &Identity) -> bool {
        self.identities.contains(identity)
    }
}

/// Outcome of delivering a block to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The block extended the tip.
    Applied(AppliedBlock),
    /// A block at this height with this hash is already part of the ledger.
    AlreadyApplied,
    /// The ledger holds a different block at this height. Nothing changed.
    Conflicting {
        ours: Option<BlockHash>,
    },
    /// The block is above `tip + 1`; the blocks in between are missing.
    Gap {
        expected: Height,
    },
}

/// Summary of an applied block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedBlock {
    pub height: Height,
    pub added: Vec<RecordId>,
    pub confirmed: Vec<TxId>,
    pub duplicates: Vec<RecordId>,
    pub foreign: usize,
}

/// Summary of a rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackSummary {
    pub fork_height: Height,
    pub new_tip: ChainTip,
    pub removed: Vec<RecordId>,
    pub removed_value: Amount,
    pub released: Vec<RecordId>,
    /// Local transactions dropped because they consumed a removed record.
    pub discarded: Vec<TxId>,
    /// Confirmed local transactions whose confirming block was orphaned; back to pending.
    pub restored: Vec<TxId>,
}

/// The wallet ledger.
pub struct Ledger {
    state: RwLock<LedgerState>,
    rules: MaturityRules,
}

impl Ledger {
    pub fn new(config: &WalletConfig) -> Self {
        Self {
            state: RwLock::new(LedgerState::new(config.max_reorg_depth)),
            rules: config.maturity_rules(),
        }
    }

    pub fn rules(&self) -> &MaturityRules {
        &self.rules
    }

    /// Shared access to the full state.
    pub async fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().await
    }

    /// Exclusive access to the full state.
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().await
    }

    /// Start tracking records paid to `identity`.
    pub async fn register_identity(&self, identity: Identity) {
        self.state.write().await.identities.insert(identity);
    }

    pub async fn is_own(&self, identity: &Identity) -> bool {
        self.state.read().await.is_own(identity)
    }

    pub async fn tip(&self) -> ChainTip {
        self.state.read().await.tip
    }

    /// Hash of the block at `height`, if it is within the retained history.
    pub async fn hash_at(&self, height: Height) -> Option<BlockHash> {
        let state = self.state.read().await;
        if height > state.tip.height {
            return None;
        }
        state.history.hash_at(height)
    }

    /// The oldest block the ledger can still roll back to.
    pub async fn checkpoint(&self) -> ChainTip {
        self.state.read().await.history.checkpoint()
    }

    /// Balance snapshot at the current tip.
    pub async fn balance(&self) -> WalletResult<WalletBalance> {
        let state = self.state.read().await;
        balance::calculate(&state, &self.rules)
    }

    pub async fn get(&self, id: &RecordId) -> Option<Record> {
        self.state.read().await.store.get(id).cloned()
    }

    /// Every stored record, oldest first.
    pub async fn records(&self) -> Vec<Record> {
        self.state.read().await.store.iter().cloned().collect()
    }

    /// Signed pending transactions, in id order.
    pub async fn pending_transactions(&self) -> Vec<SignedTransaction> {
        self.state.read().await.pending.iter().map(|p| p.tx.clone()).collect()
    }

    /// Apply a block delivered by a peer.
    pub async fn apply_block(&self, block: &BlockNotification) -> ApplyOutcome {
        let mut state = self.state.write().await;
        let tip = state.tip;

        if block.height <= tip.height {
            let ours = state.history.hash_at(block.height);
            return if ours == Some(block.hash) {
                ApplyOutcome::AlreadyApplied
            } else {
                ApplyOutcome::Conflicting {
                    ours,
                }
            };
        }
        if block.height != tip.height + 1 {
            return ApplyOutcome::Gap {
                expected: tip.height + 1,
            };
        }

        let mut applied = AppliedBlock {
            height: block.height,
            ..AppliedBlock::default()
        };

        let mut confirmed = Vec::new();
        let mut materialized = HashSet::new();
        for tx_id in &block.confirmed_tx_ids {
            let Some(pending) = state.pending.remove(tx_id) else {
                continue;
            };
            state.store.confirm(tx_id);
            for (id, owner, amount) in pending.self_outputs() {
                let record = Record::new(id, amount, block.height, RecordKind::Payment, owner);
                match state.store.add(record) {
                    Ok(()) => applied.added.push(id),
                    Err(e) => {
                        tracing::warn!("Output {} of transaction {} not materialized: {}", id, tx_id, e);
                        applied.duplicates.push(id);
                    }
                }
                materialized.insert(id);
            }
            tracing::debug!("Transaction {} confirmed at height {}", tx_id, block.height);
            applied.confirmed.push(*tx_id);
            confirmed.push(pending);
        }

        for notice in &block.records {
            if !state.is_own(&notice.owner) {
                applied.foreign += 1;
                continue;
            }
            if materialized.contains(&notice.id) {
                continue;
            }
            match state.store.add(notice.to_record(block.height)) {
                Ok(()) => applied.added.push(notice.id),
                Err(WalletError::DuplicateRecord(id)) => {
                    tracing::warn!(
                        "Ignoring duplicate record {} in block {} at height {}",
                        id,
                        block.hash,
                        block.height
                    );
                    applied.duplicates.push(id);
                }
                Err(e) => {
                    tracing::warn!("Skipping record {}: {}", notice.id, e);
                }
            }
        }

        state.tip = ChainTip {
            height: block.height,
            hash: block.hash,
        };
        state.history.record_block(block.height, block.hash, confirmed);

        tracing::debug!(
            "Applied block {} at height {}: {} records added, {} transactions confirmed",
            block.hash,
            block.height,
            applied.added.len(),
            applied.confirmed.len()
        );

        ApplyOutcome::Applied(applied)
    }

    /// Revert every record created at or above `fork_height` and reset the tip
    /// to `fork_height - 1`.
    ///
    /// Fails with `InconsistentRollback` when the fork point is genesis, lies
    /// above `tip + 1`, or below the retained history. The ledger is untouched
    /// on failure.
    pub async fn rollback_from(&self, fork_height: Height) -> SyncResult<RollbackSummary> {
        let mut state = self.state.write().await;
        let tip = state.tip;

        let reject = |reason: String| SyncError::InconsistentRollback {
            fork_height,
            reason,
        };
        if fork_height == 0 {
            return Err(reject("genesis cannot be rolled back".to_string()));
        }
        if fork_height > tip.height + 1 {
            return Err(reject(format!("fork point is above the ledger tip {}", tip.height)));
        }
        if fork_height < state.history.min_fork_height() {
            return Err(reject(format!(
                "fork point is below the retained history (oldest block {})",
                state.history.checkpoint().height
            )));
        }
        let new_height = fork_height - 1;
        let new_hash = state.history.hash_at(new_height).ok_or_else(|| {
            reject(format!("no block hash retained for height {}", new_height))
        })?;

        Ok(Self::commit_rollback(&mut state, fork_height, ChainTip {
            height: new_height,
            hash: new_hash,
        }))
    }

    /// Drop everything and return to genesis.
    pub async fn reset(&self) -> RollbackSummary {
        let mut state = self.state.write().await;
        Self::commit_rollback(&mut state, 1, ChainTip::genesis())
    }

    fn commit_rollback(state: &mut LedgerState, fork_height: Height, new_tip: ChainTip) -> RollbackSummary {
        let orphaned_confirmations = state.history.truncate_from(fork_height);
        let outcome = state.store.rollback_from(fork_height);

        let mut discarded = Vec::new();
        for tx_id in &outcome.invalidated {
            if state.pending.remove(tx_id).is_some() {
                discarded.push(*tx_id);
            }
        }

        let mut restored = Vec::new();
        for pending in orphaned_confirmations {
            let tx_id = pending.tx_id();
            if outcome.invalidated.contains(&tx_id) {
                discarded.push(tx_id);
                continue;
            }
            state.store.unconfirm(&tx_id);
            state.pending.insert(pending);
            restored.push(tx_id);
        }

        state.tip = new_tip;

        let summary = RollbackSummary {
            fork_height,
            new_tip,
            removed: outcome.removed.iter().map(|r| r.id).collect(),
            removed_value: outcome.removed_value(),
            released: outcome.released,
            discarded,
            restored,
        };

        tracing::info!(
            "Rolled back from height {}: {} records removed ({} value), {} transactions discarded, {} restored to pending, new tip {}",
            fork_height,
            summary.removed.len(),
            summary.removed_value,
            summary.discarded.len(),
            summary.restored.len(),
            new_tip
        );

        summary
    }
}
