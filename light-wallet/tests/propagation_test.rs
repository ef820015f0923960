//! Transaction propagation across several connected peers.

mod common;

use std::time::Duration;

use light_wallet::WalletConfig;
use test_utils::{DEFAULT_WAIT, SimulatedFullNode, wait_for, wait_for_height};

use common::{new_wallet, outsider, schedule};

#[tokio::test]
async fn test_pending_transactions_reach_late_peers() {
    let first = SimulatedFullNode::new(1, schedule());
    let second = SimulatedFullNode::new(2, schedule());
    let third = SimulatedFullNode::new(3, schedule());
    let wallet = new_wallet(1, WalletConfig::default());
    let me = wallet.get_new_identity().await;
    let _session = first.attach(&wallet).await;

    first.farm_blocks(4, me).await;
    assert!(wait_for_height(&wallet, 4).await);

    let early = wallet.generate_signed_transaction(10, outsider(), 0).await.unwrap();
    wallet.push_transaction(early.clone()).await;
    assert!(wait_for(DEFAULT_WAIT, || async { first.in_mempool(&early.tx_id()) }).await);
    assert!(!second.in_mempool(&early.tx_id()));

    // Connecting replays every pending transaction.
    wallet.on_peer_connected(second.connect().handle).await;
    wallet.on_peer_connected(third.connect().handle).await;
    let replayed =
        wait_for(DEFAULT_WAIT, || async { second.in_mempool(&early.tx_id()) && third.in_mempool(&early.tx_id()) })
            .await;
    assert!(replayed);

    let late = wallet.generate_signed_transaction(20, outsider(), 0).await.unwrap();
    wallet.push_transaction(late.clone()).await;
    let everywhere = wait_for(DEFAULT_WAIT, || async {
        [&first, &second, &third].iter().all(|node| node.in_mempool(&late.tx_id()))
    })
    .await;
    assert!(everywhere);
}

#[tokio::test]
async fn test_disconnected_peer_gets_nothing() {
    let first = SimulatedFullNode::new(1, schedule());
    let second = SimulatedFullNode::new(2, schedule());
    let wallet = new_wallet(2, WalletConfig::default());
    let me = wallet.get_new_identity().await;
    let _session = first.attach(&wallet).await;
    wallet.on_peer_connected(second.connect().handle).await;

    first.farm_blocks(4, me).await;
    assert!(wait_for_height(&wallet, 4).await);

    wallet.on_peer_disconnected(second.id()).await;
    let tx = wallet.generate_signed_transaction(10, outsider(), 0).await.unwrap();
    wallet.push_transaction(tx.clone()).await;

    assert!(wait_for(DEFAULT_WAIT, || async { first.in_mempool(&tx.tx_id()) }).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!second.in_mempool(&tx.tx_id()));
    assert_eq!(second.mempool_len(), 0);
}
