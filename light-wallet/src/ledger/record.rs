//! Value-bearing records (coins) tracked by the wallet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::ledger::MaturityRules;
use crate::types::{Amount, Height, Identity, RecordId, TxId};

/// Origin class of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Block reward paid to the farmer.
    Reward,
    /// Fee reward collected by the farmer.
    Fee,
    /// Regular payment output, including change.
    Payment,
}

impl RecordKind {
    /// Rewards and fees are frozen until mature; payments are spendable at once.
    pub fn requires_maturity(self) -> bool {
        matches!(self, RecordKind::Reward | RecordKind::Fee)
    }
}

/// Spend status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Unspent,
    /// Reserved by a local transaction that is not yet confirmed.
    PendingSpent,
    /// Consumed by a transaction confirmed on the synced chain.
    Spent,
    /// Origin block was orphaned. Never returned by queries.
    RolledBack,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Unspent => "unspent",
            RecordStatus::PendingSpent => "pending_spent",
            RecordStatus::Spent => "spent",
            RecordStatus::RolledBack => "rolled_back",
        }
    }

    /// Whether `self -> next` is a permitted transition.
    ///
    /// The forward path is Unspent -> PendingSpent -> Spent; any live status
    /// may become RolledBack. Rollback of a consuming transaction returns its
    /// inputs to Unspent, and an orphaned confirmation returns Spent inputs to
    /// PendingSpent.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Unspent, PendingSpent)
                | (PendingSpent, Spent)
                | (PendingSpent, Unspent)
                | (Spent, Unspent)
                | (Spent, PendingSpent)
                | (Unspent, RolledBack)
                | (PendingSpent, RolledBack)
                | (Spent, RolledBack)
        )
    }

    /// Records in these states still back the confirmed balance.
    pub fn counts_as_confirmed(self) -> bool {
        matches!(self, RecordStatus::Unspent | RecordStatus::PendingSpent)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of value ever owned by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub amount: Amount,
    /// Height of the block that created this record.
    pub origin_height: Height,
    pub kind: RecordKind,
    /// Wallet identity the record pays to.
    pub owner: Identity,
    status: RecordStatus,
    spending_tx_id: Option<TxId>,
}

impl Record {
    /// Create a new unspent record.
    pub fn new(
        id: RecordId,
        amount: Amount,
        origin_height: Height,
        kind: RecordKind,
        owner: Identity,
    ) -> Self {
        Self {
            id,
            amount,
            origin_height,
            kind,
            owner,
            status: RecordStatus::Unspent,
            spending_tx_id: None,
        }
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// The transaction reserving or consuming this record, if any.
    pub fn spending_tx_id(&self) -> Option<TxId> {
        self.spending_tx_id
    }

    /// Check if this record is mature at `at_height` under `rules`.
    pub fn is_mature(&self, rules: &MaturityRules, at_height: Height) -> bool {
        rules.is_mature(self.kind, self.origin_height, at_height)
    }

    /// Check if this record can be selected as a spend input at `at_height`.
    pub fn is_spendable(&self, rules: &MaturityRules, at_height: Height) -> bool {
        self.status == RecordStatus::Unspent && self.is_mature(rules, at_height)
    }

    /// Move to `next`, attaching or clearing the spending transaction.
    pub(crate) fn transition(&mut self, next: RecordStatus) -> WalletResult<()> {
        self.transition_with(next, self.spending_tx_id)
    }

    pub(crate) fn transition_with(
        &mut self,
        next: RecordStatus,
        spender: Option<TxId>,
    ) -> WalletResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(WalletError::InvalidTransition {
                record: self.id,
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }
        self.status = next;
        self.spending_tx_id = match next {
            RecordStatus::Unspent | RecordStatus::RolledBack => None,
            RecordStatus::PendingSpent | RecordStatus::Spent => spender,
        };
        Ok(())
    }
}
