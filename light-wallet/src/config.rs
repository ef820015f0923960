//! Configuration management for the light wallet.

use crate::error::ConfigError;
use crate::ledger::MaturityRules;

/// Default number of confirmations a reward/fee record needs beyond its origin block.
pub const DEFAULT_MATURITY_DEPTH: u32 = 2;

/// Default number of most recent blocks kept for rollback.
pub const DEFAULT_MAX_REORG_DEPTH: u32 = 100;

/// Configuration for the light wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfig {
    /// Confirmations a Reward/Fee record must strictly exceed before it is spendable.
    pub maturity_depth: u32,

    /// Additional coinbase freeze; Reward/Fee records must also strictly exceed it.
    pub coinbase_freeze_period: u32,

    /// Number of recent blocks whose hashes and local confirmations are retained.
    ///
    /// A reorg whose fork point falls below this window is an inconsistent
    /// rollback and forces a resync.
    pub max_reorg_depth: u32,

    /// Capacity of the propagation manager's command queue.
    pub peer_channel_capacity: usize,

    /// Number of wallet events buffered for slow subscribers.
    pub event_capacity: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            maturity_depth: DEFAULT_MATURITY_DEPTH,
            coinbase_freeze_period: 0,
            max_reorg_depth: DEFAULT_MAX_REORG_DEPTH,
            peer_channel_capacity: 1000,
            event_capacity: 10_000,
        }
    }
}

impl WalletConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for local simulation: no freeze, short maturity.
    pub fn regtest() -> Self {
        Self {
            maturity_depth: DEFAULT_MATURITY_DEPTH,
            coinbase_freeze_period: 0,
            ..Self::default()
        }
    }

    /// Set the maturity depth.
    pub fn with_maturity_depth(mut self, depth: u32) -> Self {
        self.maturity_depth = depth;
        self
    }

    /// Set the coinbase freeze period.
    pub fn with_coinbase_freeze_period(mut self, period: u32) -> Self {
        self.coinbase_freeze_period = period;
        self
    }

    /// Set how many recent blocks are retained for rollback.
    pub fn with_max_reorg_depth(mut self, depth: u32) -> Self {
        self.max_reorg_depth = depth;
        self
    }

    /// Set the capacity of the propagation command queue.
    pub fn with_peer_channel_capacity(mut self, capacity: usize) -> Self {
        self.peer_channel_capacity = capacity;
        self
    }

    /// Set the wallet event buffer size.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// The maturity rules derived from this configuration.
    pub fn maturity_rules(&self) -> MaturityRules {
        MaturityRules::new(self.maturity_depth, self.coinbase_freeze_period)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_reorg_depth == 0 {
            return Err(ConfigError::MustBePositive {
                field: "max_reorg_depth",
            });
        }
        if self.peer_channel_capacity == 0 {
            return Err(ConfigError::MustBePositive {
                field: "peer_channel_capacity",
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::MustBePositive {
                field: "event_capacity",
            });
        }

        // Every block younger than the maturity window must stay rollback-able.
        let window = self.maturity_rules().window();
        if self.max_reorg_depth < window {
            return Err(ConfigError::ReorgWindowTooSmall {
                max_reorg_depth: self.max_reorg_depth,
                window,
            });
        }

        Ok(())
    }
}
