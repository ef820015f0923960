#[cfg(test)]
mod tests {
    use super::super::*;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use crate::chain::RecordNotice;
    use crate::config::WalletConfig;
    use crate::error::NetworkError;
    use crate::ledger::RecordKind;
    use crate::types::{Amount, BlockHash, Identity, RecordId};

    const REWARD: Amount = 100;

    fn me() -> Identity {
        Identity::hash(b"me")
    }

    /// Chain of blocks each paying one reward to `me`. `fork` salts the hashes.
    fn chain(len: Height, fork: u8) -> Vec<BlockNotification> {
        let mut prev = BlockHash::all_zeros();
        (1..=len)
            .map(|height| {
                let salt = if height >= 3 { fork } else { 0 };
                let mut data = prev.to_byte_array().to_vec();
                data.extend_from_slice(&height.to_le_bytes());
                data.push(salt);
                let hash = BlockHash::hash(&data);
                prev = hash;
                BlockNotification {
                    height,
                    hash,
                    records: vec![RecordNotice {
                        id: RecordId::derive(hash.as_byte_array(), 0),
                        amount: REWARD,
                        kind: RecordKind::Reward,
                        owner: me(),
                    }],
                    confirmed_tx_ids: Vec::new(),
                }
            })
            .collect()
    }

    struct VecSource {
        peer: PeerId,
        blocks: Mutex<Vec<BlockNotification>>,
        /// Fail every request for a height at or above this one.
        fail_from: Mutex<Option<Height>>,
    }

    impl VecSource {
        fn new(peer: PeerId, blocks: Vec<BlockNotification>) -> Self {
            Self {
                peer,
                blocks: Mutex::new(blocks),
                fail_from: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BlockSource for VecSource {
        fn peer_id(&self) -> PeerId {
            self.peer
        }

        async fn tip(&self) -> NetworkResult<ChainTip> {
            let blocks = self.blocks.lock().unwrap();
            Ok(blocks.last().map(|b| b.tip()).unwrap_or_else(ChainTip::genesis))
        }

        async fn block_at(&self, height: Height) -> NetworkResult<BlockNotification> {
            if self.fail_from.lock().unwrap().is_some_and(|h| height >= h) {
                return Err(NetworkError::PeerDisconnected(self.peer));
            }
            let blocks = self.blocks.lock().unwrap();
            blocks
                .get(height as usize - 1)
                .cloned()
                .ok_or(NetworkError::BlockUnavailable {
                    peer: self.peer,
                    height,
                })
        }
    }

    async fn manager() -> WalletSyncManager {
        let ledger = Arc::new(Ledger::new(&WalletConfig::default()));
        ledger.register_identity(me()).await;
        WalletSyncManager::new(ledger, EventBus::default(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_unknown_peer_rejected() {
        let manager = manager().await;
        let blocks = chain(1, 0);
        assert_matches!(
            manager.on_block(PeerId(1), &blocks[0]).await,
            Err(SyncError::UnknownPeer(PeerId(1)))
        );
    }

    #[tokio::test]
    async fn test_sequential_blocks_advance_cursor() {
        let manager = manager().await;
        let peer = PeerId(1);
        manager.register_peer(peer).await;

        for block in chain(3, 0) {
            assert_matches!(manager.on_block(peer, &block).await, Ok(ApplyOutcome::Applied(_)));
        }

        let cursor = manager.cursor(peer).await.unwrap();
        assert_eq!(cursor.synced_height, 3);
        assert_eq!(cursor.state, SyncState::Synced);
        assert_eq!(manager.synced_height().await, 3);
    }

    #[tokio::test]
    async fn test_old_block_is_noop() {
        let manager = manager().await;
        let (a, b) = (PeerId(1), PeerId(2));
        manager.register_peer(a).await;
        manager.register_peer(b).await;
        let blocks = chain(2, 0);
        for block in &blocks {
            manager.on_block(a, block).await.unwrap();
        }
        let before = manager.ledger().records().await;

        assert_matches!(manager.on_block(b, &blocks[0]).await, Ok(ApplyOutcome::AlreadyApplied));

        assert_eq!(manager.ledger().records().await, before);
        assert_eq!(manager.cursor(b).await.unwrap().synced_height, 1);
    }

    #[tokio::test]
    async fn test_gap_reports_missing_blocks() {
        let manager = manager().await;
        let peer = PeerId(1);
        manager.register_peer(peer).await;
        let blocks = chain(3, 0);

        let err = manager.on_block(peer, &blocks[2]).await.unwrap_err();

        assert_eq!(
            err,
            SyncError::MissingBlocks {
                expected: 1,
                got: 3
            }
        );
        assert_eq!(manager.synced_height().await, 0);
        assert_eq!(manager.cursor(peer).await.unwrap().state, SyncState::CatchingUp);
    }

    #[tokio::test]
    async fn test_catch_up_applies_missing_blocks() {
        let manager = manager().await;
        let source = VecSource::new(PeerId(1), chain(6, 0));
        manager.register_peer(source.peer).await;

        let tip = manager.catch_up(source.peer, &source).await.unwrap();

        assert_eq!(tip.height, 6);
        assert!(manager.cursor(source.peer).await.unwrap().is_synced());
        assert_eq!(manager.ledger().records().await.len(), 6);
    }

    #[tokio::test]
    async fn test_reorg_matches_direct_sync() {
        let original = chain(6, 0);
        let replacement = chain(8, 1);

        let reorged = manager().await;
        let source = VecSource::new(PeerId(1), original);
        reorged.register_peer(source.peer).await;
        reorged.catch_up(source.peer, &source).await.unwrap();
        *source.blocks.lock().unwrap() = replacement.clone();
        let notice = ReorgNotice {
            fork_height: 3,
            new_tip_height: 8,
            new_tip_hash: replacement[7].hash,
        };
        let tip = reorged.on_reorg(source.peer, notice, &source).await.unwrap();
        assert_eq!(tip, replacement[7].tip());

        let direct = manager().await;
        let direct_source = VecSource::new(PeerId(2), replacement);
        direct.register_peer(direct_source.peer).await;
        direct.catch_up(direct_source.peer, &direct_source).await.unwrap();

        assert_eq!(reorged.ledger().records().await, direct.ledger().records().await);
        assert_eq!(reorged.ledger().tip().await, direct.ledger().tip().await);
        assert_eq!(
            reorged.ledger().balance().await.unwrap(),
            direct.ledger().balance().await.unwrap()
        );
        let cursor = reorged.cursor(source.peer).await.unwrap();
        assert_eq!(cursor.synced_tip_hash, notice.new_tip_hash);
        assert!(cursor.is_synced());
    }

    #[tokio::test]
    async fn test_reorg_clamps_other_cursors() {
        let manager = manager().await;
        let a = VecSource::new(PeerId(1), chain(6, 0));
        let b = VecSource::new(PeerId(2), chain(6, 0));
        manager.register_peer(a.peer).await;
        manager.register_peer(b.peer).await;
        manager.catch_up(a.peer, &a).await.unwrap();
        manager.catch_up(b.peer, &b).await.unwrap();
        assert_eq!(manager.cursor(b.peer).await.unwrap().synced_height, 6);

        let replacement = chain(7, 1);
        *a.blocks.lock().unwrap() = replacement.clone();
        let notice = ReorgNotice {
            fork_height: 4,
            new_tip_height: 7,
            new_tip_hash: replacement[6].hash,
        };
        manager.on_reorg(a.peer, notice, &a).await.unwrap();

        let cursor_b = manager.cursor(b.peer).await.unwrap();
        assert_eq!(cursor_b.synced_height, 3);
        assert_eq!(cursor_b.state, SyncState::CatchingUp);
    }

    #[tokio::test]
    async fn test_replay_interruption_leaves_consistent_prefix() {
        let manager = manager().await;
        let source = VecSource::new(PeerId(1), chain(5, 0));
        manager.register_peer(source.peer).await;
        manager.catch_up(source.peer, &source).await.unwrap();

        let replacement = chain(9, 1);
        *source.blocks.lock().unwrap() = replacement.clone();
        *source.fail_from.lock().unwrap() = Some(6);
        let notice = ReorgNotice {
            fork_height: 3,
            new_tip_height: 9,
            new_tip_hash: replacement[8].hash,
        };

        let err = manager.on_reorg(source.peer, notice, &source).await.unwrap_err();

        assert_matches!(
            err,
            SyncError::ReplayInterrupted {
                applied_height: 5,
                ..
            }
        );
        assert_eq!(manager.ledger().tip().await, replacement[4].tip());
        assert_eq!(manager.ledger().records().await.len(), 5);
        let cursor = manager.cursor(source.peer).await.unwrap();
        assert_eq!(cursor.state, SyncState::CatchingUp);
        assert_eq!(cursor.synced_height, 5);

        *source.fail_from.lock().unwrap() = None;
        let tip = manager.catch_up(source.peer, &source).await.unwrap();
        assert_eq!(tip, replacement[8].tip());
    }

    #[tokio::test]
    async fn test_reconnect_after_missed_reorg_follows_new_branch() {
        let manager = manager().await;
        let source = VecSource::new(PeerId(1), chain(6, 0));
        manager.register_peer(source.peer).await;
        manager.catch_up(source.peer, &source).await.unwrap();
        manager.disconnect_peer(source.peer).await;

        // The peer reorganized from height 3 while it was away.
        let replacement = chain(8, 1);
        *source.blocks.lock().unwrap() = replacement.clone();
        manager.register_peer(source.peer).await;
        let tip = manager.catch_up(source.peer, &source).await.unwrap();

        assert_eq!(tip, replacement[7].tip());
        let direct = self::manager().await;
        let direct_source = VecSource::new(PeerId(2), replacement);
        direct.register_peer(direct_source.peer).await;
        direct.catch_up(direct_source.peer, &direct_source).await.unwrap();
        assert_eq!(manager.ledger().records().await, direct.ledger().records().await);
        assert!(manager.cursor(source.peer).await.unwrap().is_synced());
    }

    #[tokio::test]
    async fn test_missed_reorg_below_history_drops_cursor() {
        let ledger = Arc::new(Ledger::new(&WalletConfig::default().with_max_reorg_depth(2)));
        ledger.register_identity(me()).await;
        let manager = WalletSyncManager::new(ledger, EventBus::default(), CancellationToken::new());
        let source = VecSource::new(PeerId(1), chain(6, 0));
        manager.register_peer(source.peer).await;
        manager.catch_up(source.peer, &source).await.unwrap();
        let before = manager.ledger().records().await;

        // Heights 4..=6 are retained; the branches part at 3.
        *source.blocks.lock().unwrap() = chain(8, 1);
        let err = manager.catch_up(source.peer, &source).await.unwrap_err();

        assert_matches!(
            err,
            SyncError::InconsistentRollback {
                fork_height: 4,
                ..
            }
        );
        assert!(manager.cursor(source.peer).await.is_none());
        assert_eq!(manager.ledger().records().await, before);
        assert_eq!(manager.ledger().tip().await.height, 6);
    }

    #[tokio::test]
    async fn test_inconsistent_rollback_drops_cursor() {
        let manager = manager().await;
        let source = VecSource::new(PeerId(1), chain(4, 0));
        manager.register_peer(source.peer).await;
        manager.catch_up(source.peer, &source).await.unwrap();
        let before = manager.ledger().records().await;

        let notice = ReorgNotice {
            fork_height: 0,
            new_tip_height: 4,
            new_tip_hash: BlockHash::all_zeros(),
        };
        let err = manager.on_reorg(source.peer, notice, &source).await.unwrap_err();

        assert_matches!(
            err,
            SyncError::InconsistentRollback {
                fork_height: 0,
                ..
            }
        );
        assert!(manager.cursor(source.peer).await.is_none());
        assert_eq!(manager.ledger().records().await, before);
    }

    #[tokio::test]
    async fn test_resync_after_dropped_cursor() {
        let manager = manager().await;
        let source = VecSource::new(PeerId(1), chain(4, 0));
        manager.register_peer(source.peer).await;
        manager.catch_up(source.peer, &source).await.unwrap();
        manager.drop_peer(source.peer, "test").await;

        *source.blocks.lock().unwrap() = chain(6, 1);
        let tip = manager.resync_peer(source.peer, &source).await.unwrap();

        assert_eq!(tip.height, 6);
        assert_eq!(manager.ledger().records().await.len(), 6);
        assert!(manager.cursor(source.peer).await.unwrap().is_synced());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_replay_fetches() {
        let manager = manager().await;
        let peer = PeerId(1);
        let cancel = manager.register_peer(peer).await;
        manager.disconnect_peer(peer).await;

        assert!(cancel.is_cancelled());
        let cursor = manager.cursor(peer).await.unwrap();
        assert!(!cursor.connected);

        let fresh = manager.register_peer(peer).await;
        assert!(!fresh.is_cancelled());
        assert!(manager.cursor(peer).await.unwrap().connected);
    }
}
