//! Balance calculation over a ledger snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::ledger::{LedgerState, MaturityRules};
use crate::types::Amount;

/// Wallet balance at the ledger tip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// Mature Unspent and PendingSpent records.
    pub confirmed: Amount,
    /// Confirmed balance less pending spends, plus outputs returning to the wallet.
    pub unconfirmed: Amount,
    /// Reward/Fee records that are not mature yet.
    pub immature: Amount,
    /// Value reserved by pending transactions.
    pub pending_outgoing: Amount,
}

impl WalletBalance {
    /// Value available to new transactions.
    pub fn spendable(&self) -> Amount {
        self.unconfirmed
    }
}

impl fmt::Display for WalletBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "confirmed: {}, unconfirmed: {}, immature: {}, pending outgoing: {}",
            self.confirmed, self.unconfirmed, self.immature, self.pending_outgoing
        )
    }
}

/// Compute the balance of `state` at its tip.
pub fn calculate(state: &LedgerState, rules: &MaturityRules) -> WalletResult<WalletBalance> {
    let at = state.tip.height;
    let mut confirmed: Amount = 0;
    let mut immature: Amount = 0;

    for record in state.store.iter().filter(|r| r.status().counts_as_confirmed()) {
        let bucket = if record.is_mature(rules, at) {
            &mut confirmed
        } else {
            &mut immature
        };
        *bucket = bucket.checked_add(record.amount).ok_or(WalletError::BalanceOverflow)?;
    }

    let pending_outgoing = state.pending.consumed_total().ok_or(WalletError::BalanceOverflow)?;
    let returning = state.pending.self_directed_total().ok_or(WalletError::BalanceOverflow)?;

    // A pending input can be counted as immature after a rollback lowered the
    // tip; the subtraction saturates in that case.
    let unconfirmed = confirmed
        .checked_add(returning)
        .ok_or(WalletError::BalanceOverflow)?
        .saturating_sub(pending_outgoing);

    Ok(WalletBalance {
        confirmed,
        unconfirmed,
        immature,
        pending_outgoing,
    })
}
