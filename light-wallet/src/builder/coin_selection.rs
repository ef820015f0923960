//! Record selection for transaction building.

use crate::error::WalletError;
use crate::ledger::Record;
use crate::types::{Amount, RecordId};

/// Record selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Oldest records first, ties broken by id. Deterministic for a given ledger state.
    #[default]
    OldestFirst,
    /// Largest records first (fewest inputs), ties broken by age then id.
    LargestFirst,
}

/// Result of record selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Selected record ids, in selection order
    pub selected: Vec<RecordId>,
    /// Total value of selected records
    pub total_value: Amount,
    /// Amount the selection had to cover (payment plus fee)
    pub target_amount: Amount,
}

impl SelectionResult {
    /// Value left over after covering the target.
    pub fn change_amount(&self) -> Amount {
        self.total_value - self.target_amount
    }

    pub fn exact_match(&self) -> bool {
        self.total_value == self.target_amount
    }
}

/// Greedy record selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinSelector {
    strategy: SelectionStrategy,
}

impl CoinSelector {
    pub fn new(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
        }
    }

    /// Select records from `candidates` until their sum covers `target_amount`.
    ///
    /// `candidates` must already be filtered to spendable records.
    pub fn select(&self, candidates: &[&Record], target_amount: Amount) -> Result<SelectionResult, WalletError> {
        let mut ordered: Vec<&Record> = candidates.to_vec();
        match self.strategy {
            SelectionStrategy::OldestFirst => {
                ordered.sort_by_key(|r| (r.origin_height, r.id));
            }
            SelectionStrategy::LargestFirst => {
                ordered.sort_by(|a, b| {
                    b.amount.cmp(&a.amount).then((a.origin_height, a.id).cmp(&(b.origin_height, b.id)))
                });
            }
        }

        let mut selected = Vec::new();
        let mut total_value: Amount = 0;
        for record in ordered {
            if total_value >= target_amount {
                break;
            }
            total_value = total_value.checked_add(record.amount).ok_or(WalletError::BalanceOverflow)?;
            selected.push(record.id);
        }

        if total_value < target_amount {
            return Err(WalletError::InsufficientFunds {
                requested: target_amount,
                available: total_value,
            });
        }

        Ok(SelectionResult {
            selected,
            total_value,
            target_amount,
        })
    }
}
