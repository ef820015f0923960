//! Outbound side of a peer connection.
//!
//! The transport itself is external. A connected peer is represented by a
//! [`PeerHandle`]: its id plus a bounded channel the transport drains and
//! forwards to the remote node.

use tokio::sync::mpsc;

use crate::builder::SignedTransaction;
use crate::error::{NetworkError, NetworkResult};
use crate::types::PeerId;

/// Handle used to hand transactions to one connected peer.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    transactions: mpsc::Sender<SignedTransaction>,
}

impl PeerHandle {
    pub fn new(id: PeerId, transactions: mpsc::Sender<SignedTransaction>) -> Self {
        Self {
            id,
            transactions,
        }
    }

    /// Create a handle together with the receiving end the transport reads from.
    pub fn channel(id: PeerId, capacity: usize) -> (Self, mpsc::Receiver<SignedTransaction>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Whether the transport side has gone away.
    pub fn is_closed(&self) -> bool {
        self.transactions.is_closed()
    }

    /// Queue `tx` for the peer without waiting.
    ///
    /// Delivery is fire-and-forget: success means the transport accepted the
    /// transaction, not that the peer did.
    pub fn send_transaction(&self, tx: SignedTransaction) -> NetworkResult<()> {
        self.transactions.try_send(tx).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NetworkError::ChannelFull(self.id),
            mpsc::error::TrySendError::Closed(_) => NetworkError::PeerDisconnected(self.id),
        })
    }
}
