use crate::types::{Amount, Height, PeerId, TxId};

/// Events the wallet emits on its event bus.
///
/// Each event describes a state change a UI or host application may want to
/// react to. Emission never blocks the emitting component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// A block extended the ledger.
    ///
    /// Emitted by: `WalletSyncManager`
    BlockApplied {
        peer: PeerId,
        height: Height,
        /// Number of records added to the store
        records_added: usize,
        /// Local transactions confirmed by this block
        confirmed: Vec<TxId>,
    },

    /// The ledger was rolled back to `fork_height - 1`.
    ///
    /// Emitted by: `WalletSyncManager`
    RolledBack {
        fork_height: Height,
        records_removed: usize,
        /// Pending transactions dropped because an input disappeared
        discarded: Vec<TxId>,
        /// Confirmed transactions returned to pending
        restored: Vec<TxId>,
    },

    /// A reorg replay finished at the peer's new tip.
    ///
    /// Emitted by: `WalletSyncManager`
    ReorgCompleted {
        peer: PeerId,
        tip_height: Height,
    },

    /// A reorg replay stopped before reaching the new tip.
    ///
    /// Emitted by: `WalletSyncManager`
    ReplayInterrupted {
        peer: PeerId,
        applied_height: Height,
    },

    /// The ledger caught up with a peer's tip.
    ///
    /// Emitted by: `WalletSyncManager`
    PeerSynced {
        peer: PeerId,
        height: Height,
    },

    /// A peer's sync cursor was dropped and requires a resync.
    ///
    /// Emitted by: `WalletSyncManager`
    SessionDropped {
        peer: PeerId,
        reason: String,
    },

    /// A transaction was built and its inputs reserved.
    ///
    /// Emitted by: `Wallet`
    TransactionCreated {
        tx_id: TxId,
        amount: Amount,
        fee: Amount,
    },

    /// A transaction was handed to connected peers.
    ///
    /// Emitted by: `PeerPropagationManager`
    TransactionPropagated {
        tx_id: TxId,
        peers: usize,
    },

    /// Emitted by: `Wallet`
    PeerConnected {
        peer: PeerId,
    },

    /// Emitted by: `Wallet`
    PeerDisconnected {
        peer: PeerId,
    },
}

impl WalletEvent {
    /// Short human-readable description, used in logs.
    pub fn description(&self) -> String {
        match self {
            WalletEvent::BlockApplied {
                peer,
                height,
                records_added,
                confirmed,
            } => format!(
                "BlockApplied(peer={}, height={}, records={}, confirmed={})",
                peer,
                height,
                records_added,
                confirmed.len()
            ),
            WalletEvent::RolledBack {
                fork_height,
                records_removed,
                discarded,
                restored,
            } => format!(
                "RolledBack(fork={}, removed={}, discarded={}, restored={})",
                fork_height,
                records_removed,
                discarded.len(),
                restored.len()
            ),
            WalletEvent::ReorgCompleted {
                peer,
                tip_height,
            } => format!("ReorgCompleted(peer={}, tip={})", peer, tip_height),
            WalletEvent::ReplayInterrupted {
                peer,
                applied_height,
            } => format!("ReplayInterrupted(peer={}, applied={})", peer, applied_height),
            WalletEvent::PeerSynced {
                peer,
                height,
            } => format!("PeerSynced(peer={}, height={})", peer, height),
            WalletEvent::SessionDropped {
                peer,
                reason,
            } => format!("SessionDropped(peer={}, reason={})", peer, reason),
            WalletEvent::TransactionCreated {
                tx_id,
                amount,
                fee,
            } => format!("TransactionCreated(tx={}, amount={}, fee={})", tx_id, amount, fee),
            WalletEvent::TransactionPropagated {
                tx_id,
                peers,
            } => format!("TransactionPropagated(tx={}, peers={})", tx_id, peers),
            WalletEvent::PeerConnected {
                peer,
            } => format!("PeerConnected({})", peer),
            WalletEvent::PeerDisconnected {
                peer,
            } => format!("PeerDisconnected({})", peer),
        }
    }
}
