//! Chain synchronization.
//!
//! Each connected peer gets a [`SyncSession`] consuming its pushed events.
//! All sessions share one [`WalletSyncManager`], which owns the per-peer
//! [`SyncCursor`]s and is the only writer of blocks and rollbacks to the ledger.

mod cursor;
mod manager;
mod session;

pub use cursor::{SyncCursor, SyncState};
pub use manager::WalletSyncManager;
pub use session::SyncSession;
