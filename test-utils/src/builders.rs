//! Test data builders for creating ledger inputs

use light_wallet::chain::{BlockNotification, RecordNotice};
use light_wallet::ledger::{Record, RecordKind};
use light_wallet::types::{Amount, BlockHash, Height, Identity, RecordId, TxId};
use rand::RngCore;

/// Builder for records announced by a block
pub struct RecordBuilder {
    id: Option<RecordId>,
    amount: Amount,
    kind: RecordKind,
    owner: Identity,
}

impl RecordBuilder {
    pub fn new(owner: Identity) -> Self {
        Self {
            id: None,
            amount: 1_000,
            kind: RecordKind::Payment,
            owner,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    /// Build the notice. Without an explicit id a random one is used.
    pub fn build(self) -> RecordNotice {
        RecordNotice {
            id: self.id.unwrap_or_else(random_record_id),
            amount: self.amount,
            kind: self.kind,
            owner: self.owner,
        }
    }

    /// Build an unspent record created at `height`.
    pub fn build_record(self, height: Height) -> Record {
        self.build().to_record(height)
    }
}

/// Builder for block notifications
///
/// The block hash is derived from the height and a salt, so two builders with
/// the same height and salt produce the same block. Record ids default to
/// `RecordId::derive(hash, index)`.
pub struct BlockBuilder {
    height: Height,
    salt: u32,
    records: Vec<(Option<RecordId>, Amount, RecordKind, Identity)>,
    confirmed_tx_ids: Vec<TxId>,
}

impl BlockBuilder {
    pub fn new(height: Height) -> Self {
        Self {
            height,
            salt: 0,
            records: Vec::new(),
            confirmed_tx_ids: Vec::new(),
        }
    }

    /// Use a different salt to build a competing block at the same height.
    pub fn with_salt(mut self, salt: u32) -> Self {
        self.salt = salt;
        self
    }

    pub fn reward_to(mut self, owner: Identity, amount: Amount) -> Self {
        self.records.push((None, amount, RecordKind::Reward, owner));
        self
    }

    pub fn fee_to(mut self, owner: Identity, amount: Amount) -> Self {
        self.records.push((None, amount, RecordKind::Fee, owner));
        self
    }

    pub fn payment_to(mut self, owner: Identity, amount: Amount) -> Self {
        self.records.push((None, amount, RecordKind::Payment, owner));
        self
    }

    pub fn with_record(mut self, notice: RecordNotice) -> Self {
        self.records.push((Some(notice.id), notice.amount, notice.kind, notice.owner));
        self
    }

    pub fn confirming(mut self, tx_id: TxId) -> Self {
        self.confirmed_tx_ids.push(tx_id);
        self
    }

    pub fn hash(&self) -> BlockHash {
        block_hash(self.height, self.salt)
    }

    pub fn build(self) -> BlockNotification {
        let hash = self.hash();
        let records = self
            .records
            .into_iter()
            .enumerate()
            .map(|(index, (id, amount, kind, owner))| RecordNotice {
                id: id.unwrap_or_else(|| RecordId::derive(hash.as_byte_array(), index as u32)),
                amount,
                kind,
                owner,
            })
            .collect();

        BlockNotification {
            height: self.height,
            hash,
            records,
            confirmed_tx_ids: self.confirmed_tx_ids,
        }
    }
}

/// Hash of the test block at `height` on the chain identified by `salt`.
pub fn block_hash(height: Height, salt: u32) -> BlockHash {
    let mut data = [0u8; 8];
    data[..4].copy_from_slice(&height.to_le_bytes());
    data[4..].copy_from_slice(&salt.to_le_bytes());
    BlockHash::hash(&data)
}

/// Blocks `1..=len`, each paying one reward of `reward` to `owner`.
pub fn reward_chain(len: Height, salt: u32, owner: Identity, reward: Amount) -> Vec<BlockNotification> {
    (1..=len).map(|height| BlockBuilder::new(height).with_salt(salt).reward_to(owner, reward).build()).collect()
}

pub fn random_identity() -> Identity {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Identity::from_byte_array(bytes)
}

pub fn random_record_id() -> RecordId {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    RecordId::from_byte_array(bytes)
}
