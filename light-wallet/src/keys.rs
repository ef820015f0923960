//! Receiving identities and transaction signing.
//!
//! Key management is external to the wallet. The wallet only asks a
//! [`KeyChain`] for fresh identities and a [`TransactionSigner`] for
//! signatures. The implementations here derive everything from a 32-byte
//! seed with keyed BLAKE3 and are suitable for simulation and tests.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::RngCore;

use crate::builder::{Signature, UnsignedTransaction};
use crate::types::Identity;

/// Source of fresh receiving identities.
pub trait KeyChain: Send + Sync {
    /// Derive the next unused identity.
    fn next_identity(&self) -> Identity;
}

/// Signs transaction bodies.
pub trait TransactionSigner: Send + Sync {
    fn sign(&self, tx: &UnsignedTransaction) -> Signature;
}

/// A 32-byte wallet seed.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WalletSeed([u8; 32]);

impl WalletSeed {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a seed from the thread-local RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for WalletSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletSeed(..)")
    }
}

/// Sequential identity derivation from a seed.
#[derive(Debug)]
pub struct DerivedKeyChain {
    seed: WalletSeed,
    next_index: AtomicU32,
}

impl DerivedKeyChain {
    pub fn new(seed: WalletSeed) -> Self {
        Self {
            seed,
            next_index: AtomicU32::new(0),
        }
    }

    /// Identity at a fixed derivation index.
    pub fn identity_at(&self, index: u32) -> Identity {
        let mut data = [0u8; 36];
        data[..32].copy_from_slice(self.seed.as_bytes());
        data[32..].copy_from_slice(&index.to_le_bytes());
        Identity::hash(&data)
    }

    /// Number of identities handed out so far.
    pub fn issued(&self) -> u32 {
        self.next_index.load(Ordering::SeqCst)
    }
}

impl KeyChain for DerivedKeyChain {
    fn next_identity(&self) -> Identity {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        self.identity_at(index)
    }
}

/// Signer producing a keyed BLAKE3 MAC over the transaction body.
#[derive(Debug, Clone)]
pub struct KeyedHashSigner {
    key: [u8; 32],
}

impl KeyedHashSigner {
    pub fn new(seed: &WalletSeed) -> Self {
        Self {
            key: blake3::derive_key("light-wallet signing key", seed.as_bytes()),
        }
    }

    /// Check a signature produced by this signer.
    pub fn verify(&self, tx: &UnsignedTransaction, signature: &Signature) -> bool {
        self.sign(tx) == *signature
    }
}

impl TransactionSigner for KeyedHashSigner {
    fn sign(&self, tx: &UnsignedTransaction) -> Signature {
        let mac = blake3::keyed_hash(&self.key, &tx.signing_bytes());
        Signature::from_bytes(mac.as_bytes().to_vec())
    }
}
