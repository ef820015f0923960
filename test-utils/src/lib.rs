//! Test utilities for the light-wallet workspace
//!
//! Builders for blocks and records, reward fixtures, polling helpers and a
//! simulated full node that wallets can sync from and push transactions to.

pub mod builders;
pub mod fixtures;
pub mod helpers;
pub mod macros;
pub mod node;

pub use builders::*;
pub use fixtures::*;
pub use helpers::*;
pub use node::*;
