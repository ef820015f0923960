#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashSet;

    use crate::config::WalletConfig;
    use crate::keys::{DerivedKeyChain, KeyedHashSigner, WalletSeed};
    use crate::ledger::{Record, RecordKind, RecordStatus};
    use crate::types::{BlockHash, ChainTip, Height, RecordId};

    struct Fixture {
        ledger: Arc<Ledger>,
        builder: TransactionBuilder,
        me: Identity,
    }

    /// Ledger at height 10 holding mature payments of the given amounts.
    async fn fixture(amounts: &[Amount]) -> Fixture {
        let seed = WalletSeed::new([5; 32]);
        let keychain = Arc::new(DerivedKeyChain::new(seed));
        let me = keychain.next_identity();
        let ledger = Arc::new(Ledger::new(&WalletConfig::default()));
        ledger.register_identity(me).await;
        {
            let mut state = ledger.write().await;
            for (i, amount) in amounts.iter().enumerate() {
                let height = i as Height + 1;
                let id = RecordId::hash(&height.to_le_bytes());
                state.store.add(Record::new(id, *amount, height, RecordKind::Payment, me)).unwrap();
            }
            state.tip = ChainTip {
                height: 10,
                hash: BlockHash::all_zeros(),
            };
        }
        let builder = TransactionBuilder::new(ledger.clone(), keychain, Arc::new(KeyedHashSigner::new(&seed)));
        Fixture {
            ledger,
            builder,
            me,
        }
    }

    #[tokio::test]
    async fn test_build_reserves_records() {
        let f = fixture(&[30, 50]).await;
        let recipient = Identity::hash(b"bob");

        let tx = f.builder.build(10, recipient, 1).await.unwrap();

        assert_eq!(tx.inputs().len(), 1);
        assert_eq!(tx.outputs()[0].recipient, recipient);
        assert_eq!(tx.outputs()[0].amount, 10);
        assert_eq!(tx.outputs()[1].amount, 19);
        assert!(f.ledger.is_own(&tx.outputs()[1].recipient).await);

        let record = f.ledger.get(&tx.inputs()[0]).await.unwrap();
        assert_eq!(record.status(), RecordStatus::PendingSpent);
        assert_eq!(record.spending_tx_id(), Some(tx.tx_id()));

        let balance = f.ledger.balance().await.unwrap();
        assert_eq!(balance.confirmed, 80);
        assert_eq!(balance.unconfirmed, 69);
        assert_eq!(balance.pending_outgoing, 30);
        assert_eq!(f.ledger.pending_transactions().await, vec![tx.clone()]);

        let state = f.ledger.read().await;
        let pending = state.pending.get(&tx.tx_id()).unwrap();
        assert_eq!(pending.created_at_height, 10);
        assert_eq!(pending.consumed_amount, 30);
        assert!(!pending.recipient_is_own);
    }

    #[tokio::test]
    async fn test_exact_amount_has_no_change_output() {
        let f = fixture(&[30]).await;
        let tx = f.builder.build(29, Identity::hash(b"bob"), 1).await.unwrap();
        assert_eq!(tx.outputs().len(), 1);
        assert_eq!(f.ledger.balance().await.unwrap().unconfirmed, 0);
    }

    #[tokio::test]
    async fn test_insufficient_funds_reserves_nothing() {
        let f = fixture(&[30, 50]).await;

        let err = f.builder.build(80, Identity::hash(b"bob"), 1).await.unwrap_err();

        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                requested: 81,
                available: 80
            }
        );
        assert!(f.ledger.pending_transactions().await.is_empty());
        assert!(f.ledger.records().await.iter().all(|r| r.status() == RecordStatus::Unspent));
    }

    #[tokio::test]
    async fn test_zero_and_overflowing_amounts_rejected() {
        let f = fixture(&[30]).await;
        assert!(matches!(
            f.builder.build(0, Identity::hash(b"bob"), 0).await,
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            f.builder.build(u64::MAX, Identity::hash(b"bob"), 1).await,
            Err(WalletError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_sequential_builds_use_distinct_records() {
        let f = fixture(&[10, 10, 10]).await;
        let a = f.builder.build(10, Identity::hash(b"bob"), 0).await.unwrap();
        let b = f.builder.build(10, Identity::hash(b"bob"), 0).await.unwrap();
        assert_ne!(a.inputs(), b.inputs());
        assert_eq!(f.ledger.balance().await.unwrap().unconfirmed, 10);
    }

    #[tokio::test]
    async fn test_payment_to_self_keeps_value() {
        let f = fixture(&[30]).await;
        f.builder.build(10, f.me, 2).await.unwrap();
        let balance = f.ledger.balance().await.unwrap();
        assert_eq!(balance.confirmed, 30);
        assert_eq!(balance.unconfirmed, 28);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_builds_never_share_records() {
        let f = fixture(&[10; 8]).await;
        let builder = Arc::new(f.builder);

        let mut handles = Vec::new();
        for i in 0..12u8 {
            let builder = builder.clone();
            handles.push(tokio::spawn(async move { builder.build(10, Identity::hash(&[i]), 0).await }));
        }

        let mut used = HashSet::new();
        let mut built = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(tx) => {
                    built += 1;
                    for input in tx.inputs() {
                        assert!(used.insert(*input), "record {} selected twice", input);
                    }
                }
                Err(e) => assert!(matches!(e, WalletError::InsufficientFunds { .. })),
            }
        }
        assert_eq!(built, 8);
        assert_eq!(f.ledger.balance().await.unwrap().unconfirmed, 0);
    }
}
