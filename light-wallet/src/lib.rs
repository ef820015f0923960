//! Light-client wallet ledger.
//!
//! This library tracks the value a wallet owns on a chain followed through
//! one or more full-node peers:
//!
//! - Follow peers' blocks, catch up over gaps and replay after reorgs
//! - Gate block rewards and fees behind a maturity depth and coinbase freeze
//! - Report confirmed and unconfirmed balances
//! - Build signed transactions without ever double-reserving a record
//! - Push transactions to every connected peer, replaying pending ones on connect
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use light_wallet::keys::{DerivedKeyChain, KeyedHashSigner, WalletSeed};
//! use light_wallet::{Wallet, WalletConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _logging = light_wallet::init_console_logging(light_wallet::LevelFilter::INFO)?;
//!
//!     let seed = WalletSeed::random();
//!     let wallet = Wallet::new(
//!         WalletConfig::default(),
//!         Arc::new(DerivedKeyChain::new(seed)),
//!         Arc::new(KeyedHashSigner::new(&seed)),
//!     )?;
//!
//!     let receive_to = wallet.get_new_identity().await;
//!     println!("pay to {}", receive_to);
//!
//!     // Hand each peer connection to the wallet:
//!     //   wallet.on_peer_connected(handle).await;
//!     //   wallet.spawn_sync_session(source, chain_events);
//!
//!     println!("confirmed: {}", wallet.get_confirmed_balance().await?);
//!     wallet.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod balance;
pub mod builder;
pub mod chain;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod keys;
pub mod ledger;
pub mod logging;
pub mod network;
pub mod propagation;
pub mod sync;
pub mod types;
pub mod wallet;

// Re-export main types for convenience
pub use balance::WalletBalance;
pub use builder::{SignedTransaction, TxOutput};
pub use chain::{BlockNotification, BlockSource, ChainEvent, RecordNotice, ReorgNotice, RewardSchedule};
pub use config::WalletConfig;
pub use error::{
    ConfigError, LightWalletError, LoggingError, LoggingResult, NetworkError, NetworkResult, Result, SyncError,
    SyncResult, WalletError, WalletResult,
};
pub use events::WalletEvent;
pub use ledger::{Record, RecordKind, RecordStatus};
pub use logging::{LogFileConfig, LoggingConfig, LoggingGuard, init_console_logging, init_logging};
pub use network::PeerHandle;
pub use sync::{SyncCursor, SyncState};
pub use tracing::level_filters::LevelFilter;
pub use types::{Amount, BlockHash, ChainTip, Height, Identity, PeerId, RecordId, TxId};
pub use wallet::Wallet;

/// Current version of the light-wallet library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
