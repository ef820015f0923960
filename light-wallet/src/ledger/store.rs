//! Record store: every record the wallet owns, indexed by id, origin height
//! and spending transaction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{WalletError, WalletResult};
use crate::ledger::{MaturityRules, Record, RecordStatus};
use crate::types::{Amount, Height, RecordId, TxId};

/// Result of removing all records created at or above a fork height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreRollback {
    /// Records whose origin block was orphaned, now RolledBack.
    pub removed: Vec<Record>,
    /// Transactions that consumed at least one removed record.
    pub invalidated: BTreeSet<TxId>,
    /// Surviving records returned to Unspent because their spender was invalidated.
    pub released: Vec<RecordId>,
}

impl StoreRollback {
    /// Total value of the removed records.
    pub fn removed_value(&self) -> Amount {
        self.removed.iter().map(|r| r.amount).fold(0, Amount::saturating_add)
    }
}

/// In-memory record store.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: HashMap<RecordId, Record>,
    by_height: BTreeMap<Height, BTreeSet<RecordId>>,
    by_spender: HashMap<TxId, BTreeSet<RecordId>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    /// Iterate records oldest first, ties broken by id.
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.by_height.values().flat_map(|ids| ids.iter()).filter_map(|id| self.records.get(id))
    }

    /// Records reserved or consumed by `tx_id`.
    pub fn consumed_by(&self, tx_id: &TxId) -> Vec<&Record> {
        self.by_spender
            .get(tx_id)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id)).collect())
            .unwrap_or_default()
    }

    /// Add a new record.
    ///
    /// Fails with `DuplicateRecord` if a record with the same id is already stored.
    pub fn add(&mut self, record: Record) -> WalletResult<()> {
        if self.records.contains_key(&record.id) {
            return Err(WalletError::DuplicateRecord(record.id));
        }
        self.by_height.entry(record.origin_height).or_default().insert(record.id);
        self.records.insert(record.id, record);
        Ok(())
    }

    /// Unspent records mature at `at_height`, oldest first with ties broken by id.
    pub fn unspent_mature(&self, at_height: Height, rules: &MaturityRules) -> Vec<&Record> {
        self.iter().filter(|r| r.is_spendable(rules, at_height)).collect()
    }

    /// Reserve `ids` for `tx_id`.
    ///
    /// Every id must refer to a distinct Unspent record; otherwise nothing changes.
    pub fn mark_pending(&mut self, ids: &[RecordId], tx_id: TxId) -> WalletResult<()> {
        let mut seen = BTreeSet::new();
        for id in ids {
            let available = self.records.get(id).is_some_and(|r| r.status() == RecordStatus::Unspent);
            if !available || !seen.insert(*id) {
                return Err(WalletError::RecordUnavailable(*id));
            }
        }

        for id in ids {
            if let Some(record) = self.records.get_mut(id) {
                record.transition_with(RecordStatus::PendingSpent, Some(tx_id))?;
            }
        }
        self.by_spender.entry(tx_id).or_default().extend(ids.iter().copied());
        Ok(())
    }

    /// Mark the records reserved by `tx_id` as Spent. Returns how many changed.
    pub fn confirm(&mut self, tx_id: &TxId) -> usize {
        self.move_spender_records(tx_id, RecordStatus::PendingSpent, RecordStatus::Spent)
    }

    /// Return Spent records of `tx_id` to PendingSpent after its confirming block was orphaned.
    pub fn unconfirm(&mut self, tx_id: &TxId) -> usize {
        self.move_spender_records(tx_id, RecordStatus::Spent, RecordStatus::PendingSpent)
    }

    /// Release every record reserved or consumed by `tx_id` back to Unspent.
    pub fn release(&mut self, tx_id: &TxId) -> Vec<RecordId> {
        let Some(ids) = self.by_spender.remove(tx_id) else {
            return Vec::new();
        };
        let mut released = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.records.get_mut(&id) {
                if record.transition(RecordStatus::Unspent).is_ok() {
                    released.push(id);
                }
            }
        }
        released
    }

    /// Remove every record with `origin_height >= fork_height`.
    ///
    /// Transactions that consumed a removed record are invalidated and their
    /// surviving inputs return to Unspent. Cannot fail.
    pub fn rollback_from(&mut self, fork_height: Height) -> StoreRollback {
        let orphaned: Vec<RecordId> = self
            .by_height
            .range(fork_height..)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();

        let invalidated: BTreeSet<TxId> = orphaned
            .iter()
            .filter_map(|id| self.records.get(id).and_then(Record::spending_tx_id))
            .collect();

        let mut removed = Vec::with_capacity(orphaned.len());
        for id in &orphaned {
            if let Some(mut record) = self.records.remove(id) {
                // Every stored status may roll back.
                let _ = record.transition(RecordStatus::RolledBack);
                removed.push(record);
            }
        }
        self.by_height.split_off(&fork_height);

        let mut released = Vec::new();
        for tx_id in &invalidated {
            released.extend(self.release(tx_id));
        }

        StoreRollback {
            removed,
            invalidated,
            released,
        }
    }

    fn move_spender_records(&mut self, tx_id: &TxId, from: RecordStatus, to: RecordStatus) -> usize {
        let Some(ids) = self.by_spender.get(tx_id) else {
            return 0;
        };
        let mut moved = 0;
        for id in ids {
            if let Some(record) = self.records.get_mut(id) {
                if record.status() == from && record.transition(to).is_ok() {
                    moved += 1;
                }
            }
        }
        moved
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
