//! Error types for the light wallet.

use std::io;

use thiserror::Error;

use crate::types::{Amount, Height, PeerId, RecordId, TxId};

/// Main error type for the light wallet.
#[derive(Debug, Error)]
pub enum LightWalletError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Parse-related errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        expected: usize,
        actual: usize,
    },
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be > 0")]
    MustBePositive {
        field: &'static str,
    },

    #[error("max_reorg_depth ({max_reorg_depth}) must cover the maturity window ({window})")]
    ReorgWindowTooSmall {
        max_reorg_depth: u32,
        window: u32,
    },
}

/// Logging-related errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log directory: {0}")]
    DirectoryCreation(#[from] io::Error),

    #[error("Subscriber initialization failed: {0}")]
    SubscriberInit(String),
}

/// Peer transport errors, as reported by the external transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Peer {0} disconnected")]
    PeerDisconnected(PeerId),

    #[error("Not connected to peer {0}")]
    NotConnected(PeerId),

    #[error("Peer {peer} has no block at height {height}")]
    BlockUnavailable {
        peer: PeerId,
        height: Height,
    },

    #[error("Inbound channel of peer {0} is full")]
    ChannelFull(PeerId),

    #[error("Timeout occurred")]
    Timeout,
}

/// Ledger and transaction-building errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The requested spend exceeds what the wallet can cover. Nothing was reserved.
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Amount,
        available: Amount,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A record id was added twice while the first copy is still live.
    #[error("Duplicate record: {0}")]
    DuplicateRecord(RecordId),

    /// A record cannot be reserved (unknown id, or not unspent).
    #[error("Record {0} is not available for spending")]
    RecordUnavailable(RecordId),

    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TxId),

    #[error("Invalid record status transition for {record}: {from} -> {to}")]
    InvalidTransition {
        record: RecordId,
        from: &'static str,
        to: &'static str,
    },

    #[error("Balance calculation overflow")]
    BalanceOverflow,
}

/// Synchronization errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The delivered block does not extend the ledger tip; blocks in between are missing.
    #[error("Missing blocks: expected height {expected}, got {got}")]
    MissingBlocks {
        expected: Height,
        got: Height,
    },

    /// The replay after a rollback was abandoned (peer gone or cancelled).
    /// The ledger holds every block up to `applied_height` and is consistent.
    #[error("Replay from {peer} interrupted at height {applied_height}: {reason}")]
    ReplayInterrupted {
        peer: PeerId,
        applied_height: Height,
        reason: String,
    },

    /// The fork point refers to history the wallet does not have.
    /// Fatal to the sync session: the peer's cursor is dropped.
    #[error("Inconsistent rollback to height {fork_height}: {reason}")]
    InconsistentRollback {
        fork_height: Height,
        reason: String,
    },

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Invalid sync state: {0}")]
    InvalidState(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl SyncError {
    /// Returns a static string representing the error category based on the variant
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::MissingBlocks {
                ..
            } => "dependency",
            SyncError::ReplayInterrupted {
                ..
            } => "interrupted",
            SyncError::InconsistentRollback {
                ..
            } => "rollback",
            SyncError::UnknownPeer(_) | SyncError::InvalidState(_) => "state",
            SyncError::Network(_) => "network",
            SyncError::Ledger(_) => "ledger",
        }
    }

    /// Whether the session can continue after this error (after a catch-up or reconnect).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::MissingBlocks {
                ..
            } | SyncError::ReplayInterrupted {
                ..
            } | SyncError::Network(_)
        )
    }
}

impl From<NetworkError> for SyncError {
    fn from(err: NetworkError) -> Self {
        SyncError::Network(err.to_string())
    }
}

impl From<WalletError> for SyncError {
    fn from(err: WalletError) -> Self {
        SyncError::Ledger(err.to_string())
    }
}

/// Type alias for Result with LightWalletError.
pub type Result<T> = std::result::Result<T, LightWalletError>;

/// Type alias for wallet operation results.
pub type WalletResult<T> = std::result::Result<T, WalletError>;

/// Type alias for sync operation results.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Type alias for network operation results.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Type alias for logging operation results.
pub type LoggingResult<T> = std::result::Result<T, LoggingError>;
