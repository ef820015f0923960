//! Maturity gating for reward and fee records.
//!
//! A Reward/Fee record created at height `h` is mature at height `t` when its
//! age `t - h` is strictly greater than the maturity depth *and* strictly
//! greater than the coinbase freeze period. The two thresholds are configured
//! independently and do not add up: the larger one decides. A record created
//! by the block at the current tip (age 0) is therefore never mature.
//! Payment records are not gated.

use crate::ledger::RecordKind;
use crate::types::Height;

/// Maturity thresholds applied to Reward/Fee records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaturityRules {
    pub maturity_depth: u32,
    pub coinbase_freeze_period: u32,
}

impl MaturityRules {
    pub const fn new(maturity_depth: u32, coinbase_freeze_period: u32) -> Self {
        Self {
            maturity_depth,
            coinbase_freeze_period,
        }
    }

    /// The age a Reward/Fee record must strictly exceed.
    pub fn window(&self) -> u32 {
        self.maturity_depth.max(self.coinbase_freeze_period)
    }

    /// Check whether a record of `kind` created at `origin_height` is mature at `at_height`.
    pub fn is_mature(&self, kind: RecordKind, origin_height: Height, at_height: Height) -> bool {
        if !kind.requires_maturity() {
            return true;
        }
        match at_height.checked_sub(origin_height) {
            Some(age) => age > self.maturity_depth && age > self.coinbase_freeze_period,
            None => false,
        }
    }

    /// First height at which a Reward/Fee record from `origin_height` is mature.
    pub fn mature_at(&self, origin_height: Height) -> Height {
        origin_height.saturating_add(self.window()).saturating_add(1)
    }

    /// Remaining blocks until a Reward/Fee record from `origin_height` matures.
    pub fn remaining(&self, origin_height: Height, at_height: Height) -> u32 {
        self.mature_at(origin_height).saturating_sub(at_height)
    }
}
