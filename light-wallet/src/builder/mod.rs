//! Transaction building.
//!
//! Building a transaction checks the balance, selects records, signs, and
//! marks the selected records as pending, all under a single ledger write
//! lock. Two concurrent builds can never select the same record.

pub mod coin_selection;
pub mod transaction;

pub use coin_selection::{CoinSelector, SelectionResult, SelectionStrategy};
pub use transaction::{
    CHANGE_OUTPUT_INDEX, PAYMENT_OUTPUT_INDEX, Signature, SignedTransaction, TxOutput, UnsignedTransaction,
};

use std::sync::Arc;

use crate::balance;
use crate::error::{WalletError, WalletResult};
use crate::keys::{KeyChain, TransactionSigner};
use crate::ledger::{Ledger, PendingTransaction};
use crate::types::{Amount, Identity};

/// Builds and reserves transactions against a ledger.
pub struct TransactionBuilder {
    ledger: Arc<Ledger>,
    keychain: Arc<dyn KeyChain>,
    signer: Arc<dyn TransactionSigner>,
    selector: CoinSelector,
}

impl TransactionBuilder {
    pub fn new(ledger: Arc<Ledger>, keychain: Arc<dyn KeyChain>, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            ledger,
            keychain,
            signer,
            selector: CoinSelector::default(),
        }
    }

    /// Use a different selection strategy.
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.selector = CoinSelector::new(strategy);
        self
    }

    /// Build a signed transaction paying `amount` to `recipient` with `fee`.
    ///
    /// On success the selected records are PendingSpent and the transaction is
    /// in the pending set. On failure nothing is reserved.
    pub async fn build(&self, amount: Amount, recipient: Identity, fee: Amount) -> WalletResult<SignedTransaction> {
        let required = amount
            .checked_add(fee)
            .ok_or_else(|| WalletError::InvalidAmount("amount plus fee overflows".to_string()))?;
        if required == 0 {
            return Err(WalletError::InvalidAmount("amount plus fee must be positive".to_string()));
        }

        let mut state = self.ledger.write().await;
        let rules = *self.ledger.rules();

        let balance = balance::calculate(&state, &rules)?;
        if required > balance.unconfirmed {
            return Err(WalletError::InsufficientFunds {
                requested: required,
                available: balance.unconfirmed,
            });
        }

        let candidates = state.store.unspent_mature(state.tip.height, &rules);
        let selection = self.selector.select(&candidates, required)?;

        let mut outputs = vec![TxOutput {
            recipient,
            amount,
        }];
        let change = selection.change_amount();
        let change_identity = (change > 0).then(|| self.keychain.next_identity());
        if let Some(change_identity) = change_identity {
            outputs.push(TxOutput {
                recipient: change_identity,
                amount: change,
            });
        }

        let unsigned = UnsignedTransaction::new(selection.selected.clone(), outputs, fee);
        let signature = self.signer.sign(&unsigned);
        let tx = unsigned.into_signed(signature);

        state.store.mark_pending(&selection.selected, tx.tx_id())?;
        if let Some(change_identity) = change_identity {
            state.identities.insert(change_identity);
        }
        let recipient_is_own = state.is_own(&recipient);
        let created_at_height = state.tip.height;
        state.pending.insert(PendingTransaction {
            tx: tx.clone(),
            consumed_amount: selection.total_value,
            recipient_is_own,
            created_at_height,
        });

        tracing::info!(
            "Built transaction {} paying {} with fee {} from {} records (change {})",
            tx.tx_id(),
            amount,
            fee,
            selection.selected.len(),
            change
        );

        Ok(tx)
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_test;
