//! Chain sync state machine shared by all peer sessions.
//!
//! The manager keeps one [`SyncCursor`] per peer and drives the ledger:
//! blocks extending the tip are applied, gaps trigger a catch-up from the
//! delivering peer, and reorg notices roll the ledger back and replay the
//! replacement blocks one at a time. The ledger lock is taken once per block,
//! never across a network request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::chain::{BlockNotification, BlockSource, ReorgNotice};
use crate::error::{NetworkResult, SyncError, SyncResult};
use crate::event_bus::EventBus;
use crate::events::WalletEvent;
use crate::ledger::{ApplyOutcome, Ledger, RollbackSummary};
use crate::sync::{SyncCursor, SyncState};
use crate::types::{ChainTip, Height, PeerId};

#[derive(Debug)]
struct PeerSync {
    cursor: SyncCursor,
    cancel: CancellationToken,
}

/// Coordinates ledger updates from every connected peer.
pub struct WalletSyncManager {
    ledger: Arc<Ledger>,
    peers: RwLock<HashMap<PeerId, PeerSync>>,
    events: EventBus<WalletEvent>,
    shutdown: CancellationToken,
}

impl WalletSyncManager {
    pub fn new(ledger: Arc<Ledger>, events: EventBus<WalletEvent>, shutdown: CancellationToken) -> Self {
        Self {
            ledger,
            peers: RwLock::new(HashMap::new()),
            events,
            shutdown,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Height of the ledger tip.
    pub async fn synced_height(&self) -> Height {
        self.ledger.tip().await.height
    }

    /// Start (or resume) tracking `peer`. Returns the token that cancels its work.
    ///
    /// A reconnecting peer keeps its previous cursor.
    pub async fn register_peer(&self, peer: PeerId) -> CancellationToken {
        let mut peers = self.peers.write().await;
        let cancel = self.shutdown.child_token();
        match peers.get_mut(&peer) {
            Some(entry) => {
                entry.cancel.cancel();
                entry.cancel = cancel.clone();
                entry.cursor.connected = true;
            }
            None => {
                peers.insert(
                    peer,
                    PeerSync {
                        cursor: SyncCursor::new(),
                        cancel: cancel.clone(),
                    },
                );
            }
        }
        tracing::debug!("Registered {} for sync", peer);
        cancel
    }

    /// Cancel in-flight work for `peer`. Its cursor is kept for a later reconnect.
    pub async fn disconnect_peer(&self, peer: PeerId) {
        let mut peers = self.peers.write().await;
        if let Some(entry) = peers.get_mut(&peer) {
            entry.cancel.cancel();
            entry.cursor.connected = false;
            if entry.cursor.state == SyncState::Synced {
                entry.cursor.state = SyncState::CatchingUp;
            }
        }
    }

    /// Forget `peer` entirely; it must resync before it is followed again.
    pub async fn drop_peer(&self, peer: PeerId, reason: &str) {
        if let Some(entry) = self.peers.write().await.remove(&peer) {
            entry.cancel.cancel();
            tracing::warn!("Dropped sync cursor of {}: {}", peer, reason);
            self.events.emit(WalletEvent::SessionDropped {
                peer,
                reason: reason.to_string(),
            });
        }
    }

    pub async fn cursor(&self, peer: PeerId) -> Option<SyncCursor> {
        self.peers.read().await.get(&peer).map(|e| e.cursor)
    }

    /// Snapshot of every cursor, ordered by peer id.
    pub async fn cursors(&self) -> Vec<(PeerId, SyncCursor)> {
        let mut cursors: Vec<_> = self.peers.read().await.iter().map(|(id, e)| (*id, e.cursor)).collect();
        cursors.sort_by_key(|(id, _)| *id);
        cursors
    }

    /// Cancellation token of the peer's current connection.
    pub async fn cancel_token(&self, peer: PeerId) -> SyncResult<CancellationToken> {
        self.peers.read().await.get(&peer).map(|e| e.cancel.clone()).ok_or(SyncError::UnknownPeer(peer))
    }

    /// Record a tip announced by `peer`.
    pub async fn on_tip_announced(&self, peer: PeerId, tip: ChainTip) -> SyncResult<()> {
        self.update_cursor(peer, |cursor| cursor.announce(tip.height)).await
    }

    /// Deliver one block from `peer`.
    ///
    /// Blocks at or below the ledger tip are no-ops (a matching hash advances
    /// the peer's cursor). A block above `tip + 1` fails with `MissingBlocks`
    /// and the caller is expected to catch up.
    pub async fn on_block(&self, peer: PeerId, block: &BlockNotification) -> SyncResult<ApplyOutcome> {
        self.cursor(peer).await.ok_or(SyncError::UnknownPeer(peer))?;

        let outcome = self.ledger.apply_block(block).await;
        match &outcome {
            ApplyOutcome::Applied(applied) => {
                self.update_cursor(peer, |cursor| cursor.advance_to(block.tip())).await?;
                self.events.emit(WalletEvent::BlockApplied {
                    peer,
                    height: block.height,
                    records_added: applied.added.len(),
                    confirmed: applied.confirmed.clone(),
                });
            }
            ApplyOutcome::AlreadyApplied => {
                self.update_cursor(peer, |cursor| cursor.advance_to(block.tip())).await?;
            }
            ApplyOutcome::Conflicting {
                ours,
            } => {
                tracing::warn!(
                    "{} delivered block {} at height {} but the ledger holds {:?}; waiting for a reorg notice",
                    peer,
                    block.hash,
                    block.height,
                    ours
                );
            }
            ApplyOutcome::Gap {
                expected,
            } => {
                self.update_cursor(peer, |cursor| cursor.announce(block.height)).await?;
                return Err(SyncError::MissingBlocks {
                    expected: *expected,
                    got: block.height,
                });
            }
        }
        Ok(outcome)
    }

    /// Fetch and apply blocks from `peer` until the ledger reaches its tip.
    ///
    /// The peer's block at the highest shared height is checked against the
    /// ledger first, including when the peer's cursor is already there: a
    /// reconnecting peer may have reorganized while it was away. On a
    /// mismatch the fork point is located and handled as a reorg notice from
    /// the peer.
    pub async fn catch_up(&self, peer: PeerId, source: &dyn BlockSource) -> SyncResult<ChainTip> {
        let cancel = self.cancel_token(peer).await?;

        let peer_tip = Self::fetch(peer, &cancel, source.tip()).await?;
        self.on_tip_announced(peer, peer_tip).await?;

        let ledger_tip = self.ledger.tip().await;
        let common = ledger_tip.height.min(peer_tip.height);
        if common > 0 {
            let theirs = Self::fetch(peer, &cancel, source.block_at(common)).await?;
            match self.ledger.hash_at(common).await {
                Some(ours) if ours == theirs.hash => {
                    self.update_cursor(peer, |cursor| cursor.advance_to(theirs.tip())).await?;
                }
                Some(ours) => {
                    let fork_height = self.find_fork_height(peer, &cancel, source, common - 1).await?;
                    tracing::warn!(
                        "{} is on a different chain at height {} (ours {}, theirs {}); reorganizing from {}",
                        peer,
                        common,
                        ours,
                        theirs.hash,
                        fork_height
                    );
                    let notice = ReorgNotice {
                        fork_height,
                        new_tip_height: peer_tip.height,
                        new_tip_hash: peer_tip.hash,
                    };
                    return self.on_reorg(peer, notice, source).await;
                }
                None => {}
            }
        }

        loop {
            let tip = self.ledger.tip().await;
            if tip.height >= peer_tip.height {
                break;
            }
            let block = Self::fetch(peer, &cancel, source.block_at(tip.height + 1)).await?;
            if let ApplyOutcome::Conflicting {
                ..
            } = self.on_block(peer, &block).await?
            {
                return Ok(tip);
            }
        }

        let tip = self.ledger.tip().await;
        tracing::info!("Caught up with {} at height {}", peer, tip.height);
        self.events.emit(WalletEvent::PeerSynced {
            peer,
            height: tip.height,
        });
        Ok(tip)
    }

    /// Handle a reorg notice from `peer`: roll back, then replay the peer's
    /// blocks from the fork point to its new tip.
    ///
    /// An inconsistent fork point drops the peer's cursor. If the replay stops
    /// early the ledger keeps every block applied so far and the cursor stays
    /// `CatchingUp`.
    pub async fn on_reorg(
        &self,
        peer: PeerId,
        notice: ReorgNotice,
        source: &dyn BlockSource,
    ) -> SyncResult<ChainTip> {
        let cancel = self.cancel_token(peer).await?;
        if notice.new_tip_height < notice.fork_height {
            return Err(SyncError::InvalidState(format!(
                "reorg from {} to height {} replaces no blocks",
                notice.fork_height, notice.new_tip_height
            )));
        }

        tracing::info!(
            "{} reorg: fork at {}, new tip {} at height {}",
            peer,
            notice.fork_height,
            notice.new_tip_hash,
            notice.new_tip_height
        );

        let summary = match self.ledger.rollback_from(notice.fork_height).await {
            Ok(summary) => summary,
            Err(e) => {
                self.drop_peer(peer, &e.to_string()).await;
                return Err(e);
            }
        };
        self.after_rollback(&summary).await;
        self.update_cursor(peer, |cursor| {
            cursor.announce(notice.new_tip_height);
            cursor.state = SyncState::CatchingUp;
        })
        .await?;

        loop {
            let tip = self.ledger.tip().await;
            if tip.height >= notice.new_tip_height {
                break;
            }
            let block = match Self::fetch(peer, &cancel, source.block_at(tip.height + 1)).await {
                Ok(block) => block,
                Err(e) => return self.interrupted(peer, e.to_string()).await,
            };
            match self.on_block(peer, &block).await {
                Ok(ApplyOutcome::Conflicting {
                    ..
                }) => {
                    return self
                        .interrupted(peer, format!("conflicting block at height {}", block.height))
                        .await;
                }
                Ok(_) => {}
                Err(e) => return self.interrupted(peer, e.to_string()).await,
            }
        }

        let tip = self.ledger.tip().await;
        if tip == notice.new_tip() {
            self.update_cursor(peer, |cursor| cursor.advance_to(notice.new_tip())).await?;
        } else {
            tracing::warn!("{} replay ended at {} but announced {}", peer, tip, notice.new_tip());
        }
        self.events.emit(WalletEvent::ReorgCompleted {
            peer,
            tip_height: tip.height,
        });
        Ok(tip)
    }

    /// Rebuild from the last checkpoint the peer agrees with (or genesis) and catch up.
    pub async fn resync_peer(&self, peer: PeerId, source: &dyn BlockSource) -> SyncResult<ChainTip> {
        if self.cursor(peer).await.is_none() {
            self.register_peer(peer).await;
        }
        let cancel = self.cancel_token(peer).await?;

        let checkpoint = self.ledger.checkpoint().await;
        let agrees = checkpoint.height == 0
            || Self::fetch(peer, &cancel, source.block_at(checkpoint.height)).await?.hash == checkpoint.hash;

        let summary = if agrees {
            self.ledger.rollback_from(checkpoint.height + 1).await?
        } else {
            tracing::warn!("{} disagrees with checkpoint {}; resyncing from genesis", peer, checkpoint);
            self.ledger.reset().await
        };
        self.after_rollback(&summary).await;

        self.catch_up(peer, source).await
    }

    /// Lowest height at which the ledger and `peer` disagree, searching down from `from`.
    ///
    /// The search stops at the oldest retained block; a fork point below it is
    /// left for the rollback to reject.
    async fn find_fork_height(
        &self,
        peer: PeerId,
        cancel: &CancellationToken,
        source: &dyn BlockSource,
        from: Height,
    ) -> SyncResult<Height> {
        let mut height = from;
        loop {
            let Some(ours) = self.ledger.hash_at(height).await else {
                return Ok(height + 1);
            };
            if height == 0 {
                return Ok(1);
            }
            let theirs = Self::fetch(peer, cancel, source.block_at(height)).await?;
            if theirs.hash == ours {
                return Ok(height + 1);
            }
            height -= 1;
        }
    }

    async fn after_rollback(&self, summary: &RollbackSummary) {
        {
            let mut peers = self.peers.write().await;
            for entry in peers.values_mut() {
                entry.cursor.clamp_to(summary.new_tip);
            }
        }
        self.events.emit(WalletEvent::RolledBack {
            fork_height: summary.fork_height,
            records_removed: summary.removed.len(),
            discarded: summary.discarded.clone(),
            restored: summary.restored.clone(),
        });
    }

    async fn interrupted(&self, peer: PeerId, reason: String) -> SyncResult<ChainTip> {
        let applied_height = self.ledger.tip().await.height;
        let _ = self.update_cursor(peer, |cursor| cursor.state = SyncState::CatchingUp).await;
        tracing::warn!("Replay from {} interrupted at height {}: {}", peer, applied_height, reason);
        self.events.emit(WalletEvent::ReplayInterrupted {
            peer,
            applied_height,
        });
        Err(SyncError::ReplayInterrupted {
            peer,
            applied_height,
            reason,
        })
    }

    async fn update_cursor(&self, peer: PeerId, f: impl FnOnce(&mut SyncCursor)) -> SyncResult<()> {
        let mut peers = self.peers.write().await;
        let entry = peers.get_mut(&peer).ok_or(SyncError::UnknownPeer(peer))?;
        f(&mut entry.cursor);
        Ok(())
    }

    async fn fetch<T>(
        peer: PeerId,
        cancel: &CancellationToken,
        request: impl Future<Output = NetworkResult<T>>,
    ) -> SyncResult<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(SyncError::Network(format!("{} cancelled", peer))),
            result = request => result.map_err(SyncError::from),
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
