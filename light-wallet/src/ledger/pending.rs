//! Locally built transactions that are not yet confirmed.

use std::collections::BTreeMap;

use crate::builder::{CHANGE_OUTPUT_INDEX, PAYMENT_OUTPUT_INDEX, SignedTransaction};
use crate::types::{Amount, Height, Identity, RecordId, TxId};

/// A transaction built by this wallet, tracked until confirmed or discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub tx: SignedTransaction,
    /// Total value of the consumed records.
    pub consumed_amount: Amount,
    /// Whether the payment output goes to one of this wallet's identities.
    pub recipient_is_own: bool,
    /// Ledger tip height when the transaction was built.
    pub created_at_height: Height,
}

impl PendingTransaction {
    pub fn tx_id(&self) -> TxId {
        self.tx.tx_id()
    }

    /// Outputs that pay back into this wallet, as (record id, owner, amount).
    pub fn self_outputs(&self) -> Vec<(RecordId, Identity, Amount)> {
        self.tx
            .outputs()
            .iter()
            .zip(0u32..)
            .filter(|(_, index)| {
                *index == CHANGE_OUTPUT_INDEX
                    || (*index == PAYMENT_OUTPUT_INDEX && self.recipient_is_own)
            })
            .map(|(output, index)| (self.tx.output_record_id(index), output.recipient, output.amount))
            .collect()
    }

    pub fn consumed_record_ids(&self) -> &[RecordId] {
        self.tx.inputs()
    }

    pub fn fee(&self) -> Amount {
        self.tx.fee()
    }

    pub fn recipient(&self) -> Option<Identity> {
        self.tx.outputs().get(PAYMENT_OUTPUT_INDEX as usize).map(|o| o.recipient)
    }

    /// Amount paid to the recipient.
    pub fn output_amount(&self) -> Amount {
        self.tx.outputs().get(PAYMENT_OUTPUT_INDEX as usize).map_or(0, |o| o.amount)
    }

    pub fn change_amount(&self) -> Amount {
        self.tx.outputs().get(CHANGE_OUTPUT_INDEX as usize).map_or(0, |o| o.amount)
    }

    pub fn change_identity(&self) -> Option<Identity> {
        self.tx.outputs().get(CHANGE_OUTPUT_INDEX as usize).map(|o| o.recipient)
    }

    /// Value returning to the wallet once confirmed.
    pub fn self_directed_amount(&self) -> Amount {
        self.self_outputs().iter().map(|(_, _, amount)| *amount).fold(0, Amount::saturating_add)
    }
}

/// Pending transactions keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    txs: BTreeMap<TxId, PendingTransaction>,
}

impl PendingSet {
    pub fn insert(&mut self, pending: PendingTransaction) {
        self.txs.insert(pending.tx_id(), pending);
    }

    pub fn remove(&mut self, tx_id: &TxId) -> Option<PendingTransaction> {
        self.txs.remove(tx_id)
    }

    pub fn get(&self, tx_id: &TxId) -> Option<&PendingTransaction> {
        self.txs.get(tx_id)
    }

    pub fn contains(&self, tx_id: &TxId) -> bool {
        self.txs.contains_key(tx_id)
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTransaction> + '_ {
        self.txs.values()
    }

    /// Sum of consumed record values across all pending transactions.
    pub fn consumed_total(&self) -> Option<Amount> {
        self.txs.values().try_fold(0u64, |acc, p| acc.checked_add(p.consumed_amount))
    }

    /// Sum of self-directed output values across all pending transactions.
    pub fn self_directed_total(&self) -> Option<Amount> {
        self.txs.values().try_fold(0u64, |acc, p| acc.checked_add(p.self_directed_amount()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Signature, TxOutput, UnsignedTransaction};

    fn pending(recipient_is_own: bool, with_change: bool) -> PendingTransaction {
        let mut outputs = vec![TxOutput {
            recipient: Identity::hash(b"to"),
            amount: 10,
        }];
        if with_change {
            outputs.push(TxOutput {
                recipient: Identity::hash(b"change"),
                amount: 4,
            });
        }
        let tx = UnsignedTransaction::new(vec![RecordId::hash(b"in")], outputs, 1)
            .into_signed(Signature::from_bytes(vec![0; 32]));
        PendingTransaction {
            tx,
            consumed_amount: if with_change { 15 } else { 11 },
            recipient_is_own,
            created_at_height: 3,
        }
    }

    #[test]
    fn test_self_outputs_external_recipient() {
        let p = pending(false, true);
        let outputs = p.self_outputs();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, RecordId::for_output(&p.tx_id(), CHANGE_OUTPUT_INDEX));
        assert_eq!(outputs[0].1, Identity::hash(b"change"));
        assert_eq!(p.self_directed_amount(), 4);
    }

    #[test]
    fn test_self_outputs_own_recipient() {
        assert_eq!(pending(true, true).self_directed_amount(), 14);
        assert_eq!(pending(true, false).self_directed_amount(), 10);
        assert_eq!(pending(false, false).self_directed_amount(), 0);
    }

    #[test]
    fn test_accessors_read_the_signed_body() {
        let p = pending(false, true);
        assert_eq!(p.consumed_record_ids(), &[RecordId::hash(b"in")]);
        assert_eq!(p.fee(), 1);
        assert_eq!(p.recipient(), Some(Identity::hash(b"to")));
        assert_eq!(p.output_amount(), 10);
        assert_eq!(p.change_amount(), 4);
        assert_eq!(p.change_identity(), Some(Identity::hash(b"change")));

        let exact = pending(false, false);
        assert_eq!(exact.change_amount(), 0);
        assert_eq!(exact.change_identity(), None);
    }

    #[test]
    fn test_pending_set_totals() {
        let mut set = PendingSet::default();
        set.insert(pending(false, true));
        set.insert(pending(true, false));
        assert_eq!(set.len(), 2);
        assert_eq!(set.consumed_total(), Some(26));
        assert_eq!(set.self_directed_total(), Some(14));
    }
}
