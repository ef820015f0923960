//! Event loop for one peer connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chain::{BlockSource, ChainEvent};
use crate::error::{SyncError, SyncResult};
use crate::sync::WalletSyncManager;
use crate::types::PeerId;

/// Consumes the chain events pushed by one peer and feeds them to the sync manager.
pub struct SyncSession {
    peer: PeerId,
    manager: Arc<WalletSyncManager>,
    source: Arc<dyn BlockSource>,
    events: mpsc::Receiver<ChainEvent>,
}

impl SyncSession {
    pub fn new(
        manager: Arc<WalletSyncManager>,
        source: Arc<dyn BlockSource>,
        events: mpsc::Receiver<ChainEvent>,
    ) -> Self {
        Self {
            peer: source.peer_id(),
            manager,
            source,
            events,
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Run until the peer disconnects, the event stream ends, or a fatal error.
    ///
    /// Returns `Ok(())` on a clean stop. Transient errors are logged and the
    /// session keeps going; `InconsistentRollback` and `ReplayInterrupted`
    /// end it.
    pub async fn run(mut self) -> SyncResult<()> {
        let cancel = self.manager.register_peer(self.peer).await;
        tracing::info!("Sync session with {} started", self.peer);

        if let Err(e) = self.handle_catch_up(&cancel).await {
            return self.finish(e);
        }

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if let Err(e) = self.handle_event(event, &cancel).await {
                return self.finish(e);
            }
        }

        tracing::info!("Sync session with {} stopped", self.peer);
        Ok(())
    }

    async fn handle_event(&mut self, event: ChainEvent, cancel: &CancellationToken) -> SyncResult<()> {
        match event {
            ChainEvent::Block(block) => match self.manager.on_block(self.peer, &block).await {
                Ok(_) => Ok(()),
                Err(SyncError::MissingBlocks {
                    expected,
                    got,
                }) => {
                    tracing::debug!("{} sent height {} while we need {}; catching up", self.peer, got, expected);
                    self.handle_catch_up(cancel).await
                }
                Err(e) => Err(e),
            },
            ChainEvent::Reorg(notice) => {
                self.manager.on_reorg(self.peer, notice, self.source.as_ref()).await.map(|_| ())
            }
            ChainEvent::Tip(tip) => {
                self.manager.on_tip_announced(self.peer, tip).await?;
                if tip.height > self.manager.synced_height().await {
                    self.handle_catch_up(cancel).await?;
                }
                Ok(())
            }
        }
    }

    async fn handle_catch_up(&self, cancel: &CancellationToken) -> SyncResult<()> {
        match self.manager.catch_up(self.peer, self.source.as_ref()).await {
            Ok(_) => Ok(()),
            Err(e) if cancel.is_cancelled() => {
                tracing::debug!("Catch-up with {} cancelled: {}", self.peer, e);
                Ok(())
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("Catch-up with {} failed: {}", self.peer, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&self, err: SyncError) -> SyncResult<()> {
        tracing::warn!("Sync session with {} ended: {} ({})", self.peer, err, err.category());
        Err(err)
    }
}
