//! Common type definitions for the light wallet.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Block height. Genesis is height 0.
pub type Height = u32;

/// Value in the chain's smallest unit.
pub type Amount = u64;

macro_rules! hash_newtype {
    ($(#[$attr:meta])* $name:ident, $tag:literal) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Length of the identifier in bytes.
            pub const LEN: usize = 32;

            /// Wrap a raw 32-byte array.
            pub const fn from_byte_array(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// The all-zero value, used as a placeholder (e.g. the genesis parent).
            pub const fn all_zeros() -> Self {
                Self([0u8; 32])
            }

            /// Borrow the raw bytes.
            pub fn as_byte_array(&self) -> &[u8; 32] {
                &self.0
            }

            /// Return the raw bytes.
            pub fn to_byte_array(self) -> [u8; 32] {
                self.0
            }

            /// Hash arbitrary data into this identifier type, domain separated by type.
            pub fn hash(data: &[u8]) -> Self {
                let mut hasher = blake3::Hasher::new();
                hasher.update($tag.as_bytes());
                hasher.update(data);
                Self(*hasher.finalize().as_bytes())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &hex::encode(&self.0[..6]))
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|e| ParseError::InvalidHex(e.to_string()))?;
                let array: [u8; 32] = bytes
                    .try_into()
                    .map_err(|v: Vec<u8>| ParseError::InvalidLength {
                        expected: Self::LEN,
                        actual: v.len(),
                    })?;
                Ok(Self(array))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }
    };
}

hash_newtype!(
    /// Content-derived identifier of a value-bearing record (coin).
    RecordId,
    "light-wallet/record"
);

hash_newtype!(
    /// Identifier of a transaction, derived from its unsigned body.
    TxId,
    "light-wallet/tx"
);

hash_newtype!(
    /// Hash of a block as asserted by the delivering peer.
    BlockHash,
    "light-wallet/block"
);

hash_newtype!(
    /// A wallet-owned receiving identity (the hash a record is paid to).
    Identity,
    "light-wallet/identity"
);

impl RecordId {
    /// Derive the id of the `index`-th record created by `parent`.
    ///
    /// Used for transaction outputs (`parent` is the tx id) and by block
    /// producers for reward records (`parent` is the block hash).
    pub fn derive(parent: &[u8; 32], index: u32) -> Self {
        let mut data = [0u8; 36];
        data[..32].copy_from_slice(parent);
        data[32..].copy_from_slice(&index.to_le_bytes());
        Self::hash(&data)
    }

    /// Id of output `index` of transaction `tx_id`.
    pub fn for_output(tx_id: &TxId, index: u32) -> Self {
        Self::derive(tx_id.as_byte_array(), index)
    }
}

/// Identifier of a connected full-node peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// A (height, hash) pair naming a chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainTip {
    pub height: Height,
    pub hash: BlockHash,
}

impl ChainTip {
    /// The tip of an empty chain: genesis at height 0.
    pub const fn genesis() -> Self {
        Self {
            height: 0,
            hash: BlockHash::all_zeros(),
        }
    }
}

impl Default for ChainTip {
    fn default() -> Self {
        Self::genesis()
    }
}

impl fmt::Display for ChainTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.height, self.hash)
    }
}
