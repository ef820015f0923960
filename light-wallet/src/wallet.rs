//! The wallet facade tying ledger, sync, building and propagation together.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::balance::WalletBalance;
use crate::builder::{SignedTransaction, TransactionBuilder};
use crate::chain::{BlockSource, ChainEvent};
use crate::config::WalletConfig;
use crate::error::{Result, SyncResult, WalletResult};
use crate::event_bus::{EventBus, EventReceiver};
use crate::events::WalletEvent;
use crate::keys::{KeyChain, TransactionSigner};
use crate::ledger::Ledger;
use crate::network::PeerHandle;
use crate::propagation::{PeerPropagationManager, PropagationHandle};
use crate::sync::{SyncSession, WalletSyncManager};
use crate::types::{Amount, ChainTip, Height, Identity, PeerId};

/// A light-client wallet.
///
/// Must be created inside a Tokio runtime: the propagation manager runs on its
/// own task from construction until [`Wallet::shutdown`].
pub struct Wallet {
    config: WalletConfig,
    ledger: Arc<Ledger>,
    keychain: Arc<dyn KeyChain>,
    builder: TransactionBuilder,
    sync: Arc<WalletSyncManager>,
    propagation: PropagationHandle,
    propagation_task: Mutex<Option<JoinHandle<()>>>,
    events: EventBus<WalletEvent>,
    shutdown: CancellationToken,
}

impl Wallet {
    pub fn new(
        config: WalletConfig,
        keychain: Arc<dyn KeyChain>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<Self> {
        config.validate()?;

        let ledger = Arc::new(Ledger::new(&config));
        let events = EventBus::new(config.event_capacity);
        let shutdown = CancellationToken::new();
        let sync = Arc::new(WalletSyncManager::new(ledger.clone(), events.clone(), shutdown.clone()));
        let builder = TransactionBuilder::new(ledger.clone(), keychain.clone(), signer);
        let (propagation, propagation_task) = PeerPropagationManager::spawn(
            ledger.clone(),
            events.clone(),
            config.peer_channel_capacity,
            shutdown.clone(),
        );

        tracing::info!(
            "Wallet created: maturity depth {}, coinbase freeze {}, reorg window {}",
            config.maturity_depth,
            config.coinbase_freeze_period,
            config.max_reorg_depth
        );

        Ok(Self {
            config,
            ledger,
            keychain,
            builder,
            sync,
            propagation,
            propagation_task: Mutex::new(Some(propagation_task)),
            events,
            shutdown,
        })
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn sync_manager(&self) -> &Arc<WalletSyncManager> {
        &self.sync
    }

    /// Sum of mature Unspent and PendingSpent records at the ledger tip.
    pub async fn get_confirmed_balance(&self) -> WalletResult<Amount> {
        Ok(self.ledger.balance().await?.confirmed)
    }

    /// Confirmed balance less pending spends, plus pending change and self-payments.
    pub async fn get_unconfirmed_balance(&self) -> WalletResult<Amount> {
        Ok(self.ledger.balance().await?.unconfirmed)
    }

    /// Full balance breakdown, computed from a single ledger snapshot.
    pub async fn get_balance(&self) -> WalletResult<WalletBalance> {
        self.ledger.balance().await
    }

    /// Derive a new receiving identity and start tracking records paid to it.
    pub async fn get_new_identity(&self) -> Identity {
        let identity = self.keychain.next_identity();
        self.ledger.register_identity(identity).await;
        identity
    }

    /// Build and sign a transaction, reserving its inputs.
    pub async fn generate_signed_transaction(
        &self,
        amount: Amount,
        recipient: Identity,
        fee: Amount,
    ) -> WalletResult<SignedTransaction> {
        let tx = self.builder.build(amount, recipient, fee).await?;
        self.events.emit(WalletEvent::TransactionCreated {
            tx_id: tx.tx_id(),
            amount,
            fee,
        });
        Ok(tx)
    }

    /// Hand `tx` to every connected peer without waiting for them.
    pub async fn push_transaction(&self, tx: SignedTransaction) {
        self.propagation.push_transaction(tx).await;
    }

    /// A peer connected: replay pending transactions to it and start tracking its sync cursor.
    pub async fn on_peer_connected(&self, peer: PeerHandle) {
        let id = peer.id();
        self.sync.register_peer(id).await;
        self.propagation.peer_connected(peer).await;
        self.events.emit(WalletEvent::PeerConnected {
            peer: id,
        });
    }

    /// A peer disconnected: stop pushing to it and cancel its in-flight sync work.
    pub async fn on_peer_disconnected(&self, peer: PeerId) {
        self.propagation.peer_disconnected(peer).await;
        self.sync.disconnect_peer(peer).await;
        self.events.emit(WalletEvent::PeerDisconnected {
            peer,
        });
    }

    /// Run a sync session for the peer behind `source` on its own task.
    pub fn spawn_sync_session(
        &self,
        source: Arc<dyn BlockSource>,
        events: mpsc::Receiver<ChainEvent>,
    ) -> JoinHandle<SyncResult<()>> {
        let session = SyncSession::new(self.sync.clone(), source, events);
        tokio::spawn(session.run())
    }

    /// Rebuild the ledger from the peer behind `source` after its cursor was dropped.
    pub async fn resync_peer(&self, source: &dyn BlockSource) -> SyncResult<ChainTip> {
        self.sync.resync_peer(source.peer_id(), source).await
    }

    pub fn subscribe(&self) -> EventReceiver<WalletEvent> {
        self.events.subscribe()
    }

    pub async fn pending_transactions(&self) -> Vec<SignedTransaction> {
        self.ledger.pending_transactions().await
    }

    pub async fn synced_height(&self) -> Height {
        self.ledger.tip().await.height
    }

    /// Stop the propagation manager and cancel every sync session.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.propagation_task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!("Propagation task ended abnormally: {}", e);
            }
        }
        tracing::info!("Wallet shut down at height {}", self.synced_height().await);
    }
}
