//! Propagation of locally built transactions to connected peers.
//!
//! A single [`PeerPropagationManager`] task owns the set of connected peers
//! and processes commands in order: pushes go to every peer connected at that
//! moment, and a newly connected peer receives every still-pending
//! transaction. Sends never wait for the peer.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::builder::SignedTransaction;
use crate::error::NetworkError;
use crate::event_bus::EventBus;
use crate::events::WalletEvent;
use crate::ledger::Ledger;
use crate::network::PeerHandle;
use crate::types::PeerId;

/// Commands accepted by the propagation task.
#[derive(Debug)]
pub enum PropagationCommand {
    Push(SignedTransaction),
    PeerConnected(PeerHandle),
    PeerDisconnected(PeerId),
}

/// Per-peer outcome of a push.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub delivered: Vec<PeerId>,
    pub failed: Vec<(PeerId, NetworkError)>,
}

/// Cloneable handle for sending commands to the propagation task.
#[derive(Debug, Clone)]
pub struct PropagationHandle {
    commands: mpsc::Sender<PropagationCommand>,
}

impl PropagationHandle {
    /// Queue `tx` for every connected peer.
    pub async fn push_transaction(&self, tx: SignedTransaction) {
        self.send(PropagationCommand::Push(tx)).await;
    }

    pub async fn peer_connected(&self, peer: PeerHandle) {
        self.send(PropagationCommand::PeerConnected(peer)).await;
    }

    pub async fn peer_disconnected(&self, peer: PeerId) {
        self.send(PropagationCommand::PeerDisconnected(peer)).await;
    }

    async fn send(&self, command: PropagationCommand) {
        if self.commands.send(command).await.is_err() {
            tracing::warn!("Propagation task stopped; command dropped");
        }
    }
}

/// Owns the connected peers and fans transactions out to them.
pub struct PeerPropagationManager {
    ledger: Arc<Ledger>,
    peers: BTreeMap<PeerId, PeerHandle>,
    events: EventBus<WalletEvent>,
}

impl PeerPropagationManager {
    pub fn new(ledger: Arc<Ledger>, events: EventBus<WalletEvent>) -> Self {
        Self {
            ledger,
            peers: BTreeMap::new(),
            events,
        }
    }

    /// Start the manager on its own task.
    pub fn spawn(
        ledger: Arc<Ledger>,
        events: EventBus<WalletEvent>,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (PropagationHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let manager = Self::new(ledger, events);
        let task = tokio::spawn(manager.run(rx, shutdown));
        (
            PropagationHandle {
                commands: tx,
            },
            task,
        )
    }

    /// Ids of the currently connected peers.
    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PropagationCommand>, shutdown: CancellationToken) {
        tracing::debug!("Propagation manager started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }
        tracing::debug!("Propagation manager stopped with {} peers connected", self.peers.len());
    }

    pub async fn handle(&mut self, command: PropagationCommand) {
        match command {
            PropagationCommand::Push(tx) => {
                self.push(&tx);
            }
            PropagationCommand::PeerConnected(peer) => {
                self.connect(peer).await;
            }
            PropagationCommand::PeerDisconnected(peer) => {
                self.disconnect(peer);
            }
        }
    }

    /// Hand `tx` to every connected peer.
    pub fn push(&mut self, tx: &SignedTransaction) -> PropagationReport {
        let mut report = PropagationReport::default();
        for (id, peer) in &self.peers {
            match peer.send_transaction(tx.clone()) {
                Ok(()) => report.delivered.push(*id),
                Err(e) => report.failed.push((*id, e)),
            }
        }
        self.drop_closed(&report);

        tracing::debug!(
            "Pushed transaction {} to {} peers ({} failed)",
            tx.tx_id(),
            report.delivered.len(),
            report.failed.len()
        );
        self.events.emit(WalletEvent::TransactionPropagated {
            tx_id: tx.tx_id(),
            peers: report.delivered.len(),
        });
        report
    }

    /// Register `peer` and send it every pending transaction.
    pub async fn connect(&mut self, peer: PeerHandle) -> PropagationReport {
        let id = peer.id();
        let pending = self.ledger.pending_transactions().await;
        let mut report = PropagationReport::default();
        for tx in pending {
            match peer.send_transaction(tx) {
                Ok(()) => report.delivered.push(id),
                Err(e) => report.failed.push((id, e)),
            }
        }
        if self.peers.insert(id, peer).is_some() {
            tracing::debug!("Replaced handle for {}", id);
        }
        tracing::info!("{} connected, replayed {} pending transactions", id, report.delivered.len());
        report
    }

    pub fn disconnect(&mut self, peer: PeerId) {
        if self.peers.remove(&peer).is_some() {
            tracing::info!("{} disconnected", peer);
        }
    }

    fn drop_closed(&mut self, report: &PropagationReport) {
        for (id, err) in &report.failed {
            match err {
                NetworkError::PeerDisconnected(_) => {
                    tracing::warn!("Dropping {}: transport closed", id);
                    self.peers.remove(id);
                }
                other => tracing::warn!("Failed to push to {}: {}", id, other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Signature, UnsignedTransaction};
    use crate::config::WalletConfig;

    fn tx(fee: u64) -> SignedTransaction {
        UnsignedTransaction::new(Vec::new(), Vec::new(), fee).into_signed(Signature::from_bytes(Vec::new()))
    }

    fn manager() -> PeerPropagationManager {
        PeerPropagationManager::new(Arc::new(Ledger::new(&WalletConfig::default())), EventBus::default())
    }

    #[tokio::test]
    async fn test_push_reaches_connected_peers_only() {
        let mut manager = manager();
        let (a, mut a_rx) = PeerHandle::channel(PeerId(1), 4);
        let (b, mut b_rx) = PeerHandle::channel(PeerId(2), 4);
        manager.connect(a).await;
        manager.connect(b).await;
        manager.disconnect(PeerId(2));

        let report = manager.push(&tx(1));

        assert_eq!(report.delivered, vec![PeerId(1)]);
        assert_eq!(a_rx.recv().await.unwrap(), tx(1));
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_peer_is_dropped() {
        let mut manager = manager();
        let (a, a_rx) = PeerHandle::channel(PeerId(1), 4);
        manager.connect(a).await;
        drop(a_rx);

        let report = manager.push(&tx(1));

        assert_eq!(report.failed, vec![(PeerId(1), NetworkError::PeerDisconnected(PeerId(1)))]);
        assert!(manager.peers().is_empty());
    }

    #[tokio::test]
    async fn test_full_peer_does_not_block_others() {
        let mut manager = manager();
        let (slow, _slow_rx) = PeerHandle::channel(PeerId(1), 1);
        let (fast, mut fast_rx) = PeerHandle::channel(PeerId(2), 8);
        manager.connect(slow).await;
        manager.connect(fast).await;

        manager.push(&tx(1));
        let report = manager.push(&tx(2));

        assert_eq!(report.delivered, vec![PeerId(2)]);
        assert_eq!(report.failed, vec![(PeerId(1), NetworkError::ChannelFull(PeerId(1)))]);
        assert_eq!(manager.peers(), vec![PeerId(1), PeerId(2)]);
        assert_eq!(fast_rx.recv().await.unwrap(), tx(1));
        assert_eq!(fast_rx.recv().await.unwrap(), tx(2));
    }

    #[tokio::test]
    async fn test_spawned_manager_stops_on_shutdown() {
        let ledger = Arc::new(Ledger::new(&WalletConfig::default()));
        let shutdown = CancellationToken::new();
        let (handle, task) = PeerPropagationManager::spawn(ledger, EventBus::default(), 8, shutdown.clone());

        let (peer, mut rx) = PeerHandle::channel(PeerId(1), 4);
        handle.peer_connected(peer).await;
        handle.push_transaction(tx(5)).await;
        assert_eq!(rx.recv().await.unwrap(), tx(5));

        shutdown.cancel();
        task.await.unwrap();
    }
}
