use std::fmt;
use std::str::FromStr;

use k256::PublicKey;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use super::key_tree::ser_p;

/// Size of an owner address in bytes
pub const ADDRESS_SIZE: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must be 0x followed by 40 hex characters, got {0:?}")]
    Invalid(String),
}

/// Ledger identity of a master key: the last 20 bytes of
/// `keccak256(X ∥ Y)`, shown as `0x`-prefixed lowercase hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerAddress([u8; ADDRESS_SIZE]);

impl OwnerAddress {
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = Keccak256::digest(ser_p(public_key));
        let mut out = [0u8; ADDRESS_SIZE];
        out.copy_from_slice(&digest[32 - ADDRESS_SIZE..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for OwnerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for OwnerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerAddress({})", self)
    }
}

impl FromStr for OwnerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::Invalid(s.to_string()))?;
        let mut out = [0u8; ADDRESS_SIZE];
        hex::decode_to_slice(digits, &mut out).map_err(|_| AddressError::Invalid(s.to_string()))?;
        Ok(Self(out))
    }
}

impl TryFrom<String> for OwnerAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OwnerAddress> for String {
    fn from(address: OwnerAddress) -> Self {
        address.to_string()
    }
}
