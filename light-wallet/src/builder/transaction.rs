//! Transaction types produced by the builder.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Amount, Identity, RecordId, TxId};

/// Output index of the payment to the recipient.
pub const PAYMENT_OUTPUT_INDEX: u32 = 0;

/// Output index of the change back to the wallet, when present.
pub const CHANGE_OUTPUT_INDEX: u32 = 1;

/// A single transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub recipient: Identity,
    pub amount: Amount,
}

/// Signature bytes over a transaction body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

/// The body of a transaction before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    inputs: Vec<RecordId>,
    outputs: Vec<TxOutput>,
    fee: Amount,
}

impl UnsignedTransaction {
    pub fn new(inputs: Vec<RecordId>, outputs: Vec<TxOutput>, fee: Amount) -> Self {
        Self {
            inputs,
            outputs,
            fee,
        }
    }

    pub fn inputs(&self) -> &[RecordId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// Canonical byte encoding of the body. This is what gets signed.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + self.inputs.len() * 32 + self.outputs.len() * 40);
        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for id in &self.inputs {
            buf.extend_from_slice(id.as_byte_array());
        }
        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(output.recipient.as_byte_array());
            buf.extend_from_slice(&output.amount.to_le_bytes());
        }
        buf.extend_from_slice(&self.fee.to_le_bytes());
        buf
    }

    /// Transaction id: hash of the canonical body.
    pub fn tx_id(&self) -> TxId {
        TxId::hash(&self.signing_bytes())
    }

    /// Attach a signature.
    pub fn into_signed(self, signature: Signature) -> SignedTransaction {
        SignedTransaction {
            tx_id: self.tx_id(),
            inputs: self.inputs,
            outputs: self.outputs,
            fee: self.fee,
            signature,
        }
    }
}

/// A signed transaction ready for propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    tx_id: TxId,
    inputs: Vec<RecordId>,
    outputs: Vec<TxOutput>,
    fee: Amount,
    signature: Signature,
}

impl SignedTransaction {
    pub fn tx_id(&self) -> TxId {
        self.tx_id
    }

    /// Records consumed by this transaction.
    pub fn inputs(&self) -> &[RecordId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn fee(&self) -> Amount {
        self.fee
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Sum of all output amounts.
    pub fn output_total(&self) -> Amount {
        self.outputs.iter().map(|o| o.amount).fold(0, Amount::saturating_add)
    }

    /// Record id of output `index`.
    pub fn output_record_id(&self, index: u32) -> RecordId {
        RecordId::for_output(&self.tx_id, index)
    }

    /// The unsigned body, e.g. for signature verification.
    pub fn unsigned(&self) -> UnsignedTransaction {
        UnsignedTransaction::new(self.inputs.clone(), self.outputs.clone(), self.fee)
    }
}
