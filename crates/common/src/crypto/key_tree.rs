//! Hierarchical deterministic key derivation over secp256k1
//!
//! A master [`ExtendedKey`] is generated from an arbitrary seed and every
//! per-application key is derived from it as a child. The derivation follows
//! BIP32 with one deliberate deviation: public points are serialized as the
//! raw `X ∥ Y` concatenation (64 bytes) rather than the compressed SEC1 form.
//! Keys derived (and stored) by earlier clients depend on that layout, so it
//! must not change without migrating stored credentials.
//!
//! # Derivation messages
//!
//! ```text
//! hardened:     0x00 ∥ ser256(k_par) ∥ ser32(i)      (37 bytes)
//! non-hardened: serP(K_par) ∥ ser32(i)               (68 bytes)
//! ```
//!
//! `I = HMAC-SHA512(chain_code_par, message)`, `k_child = k_par + parse256(I_L) mod N`,
//! `chain_code_child = I_R`.

use std::fmt;

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, NonZeroScalar, PublicKey, Scalar, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::address::OwnerAddress;

type HmacSha512 = Hmac<Sha512>;

/// Top bit of a child index, set for hardened derivation
pub const HARDENED_BIT: u32 = 0x8000_0000;
/// HMAC key used to derive the master key from a seed
pub const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";
/// Size of a serialized private scalar in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of a raw `X ∥ Y` public point in bytes
pub const PUBLIC_KEY_SIZE: usize = 64;
/// Size of an uncompressed SEC1 point (`0x04 ∥ X ∥ Y`) in bytes
pub const SEC1_UNCOMPRESSED_SIZE: usize = 65;
/// Size of a chain code in bytes
pub const CHAIN_CODE_SIZE: usize = 32;

/// Errors that can occur during key derivation
#[derive(Debug, thiserror::Error)]
pub enum KeyTreeError {
    /// The seed hashed to a scalar outside `[1, N)`
    #[error("seed produced an invalid master key")]
    InvalidSeed,
    /// The derivation at this index produced an invalid scalar
    #[error("invalid child key at index {0:#010x}")]
    InvalidChildKey(u32),
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),
}

/// What to do when a child derivation lands outside the curve order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationPolicy {
    /// Surface [`KeyTreeError::InvalidChildKey`] to the caller
    Strict,
    /// Move on to `index + 1`, staying within the same half of the index space
    #[default]
    NextIndex,
}

/// A 256-bit chain code, wiped on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ChainCode([u8; CHAIN_CODE_SIZE]);

impl ChainCode {
    pub fn as_bytes(&self) -> &[u8; CHAIN_CODE_SIZE] {
        &self.0
    }
}

impl From<[u8; CHAIN_CODE_SIZE]> for ChainCode {
    fn from(bytes: [u8; CHAIN_CODE_SIZE]) -> Self {
        ChainCode(bytes)
    }
}

impl fmt::Debug for ChainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChainCode(..)")
    }
}

/// A secp256k1 key pair together with its chain code
///
/// The public point is always computed from the private scalar when the key
/// is constructed; there is no way to build an `ExtendedKey` with an
/// independently supplied public key. The private scalar and the chain code
/// are zeroed when the key is dropped.
///
/// # Examples
///
/// ```ignore
/// let master = ExtendedKey::from_seed(&seed)?;
/// let child = master.derive_child(HARDENED_BIT | 7)?;
/// assert_eq!(child.public_key_bytes().len(), PUBLIC_KEY_SIZE);
/// ```
#[derive(Clone)]
pub struct ExtendedKey {
    secret: SecretKey,
    public: PublicKey,
    chain_code: ChainCode,
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

impl ExtendedKey {
    /// Generate the master key for a seed
    ///
    /// # Errors
    ///
    /// Returns [`KeyTreeError::InvalidSeed`] when `parse256(I_L)` is zero or
    /// not below the curve order. The caller should pick a different seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyTreeError> {
        let i = hmac_sha512(MASTER_HMAC_KEY, seed)?;
        let (il, ir) = split(&i);

        let scalar = parse256(&il).ok_or(KeyTreeError::InvalidSeed)?;
        Self::from_scalar(scalar, ChainCode(*ir)).map_err(|_| KeyTreeError::InvalidSeed)
    }

    /// Rebuild an extended key from a stored private key and chain code
    pub fn from_parts(private_key: &[u8], chain_code: &[u8]) -> Result<Self, KeyTreeError> {
        if private_key.len() != PRIVATE_KEY_SIZE {
            return Err(KeyTreeError::InvalidKeyMaterial(format!(
                "expected {} byte private key, got {}",
                PRIVATE_KEY_SIZE,
                private_key.len()
            )));
        }
        if chain_code.len() != CHAIN_CODE_SIZE {
            return Err(KeyTreeError::InvalidKeyMaterial(format!(
                "expected {} byte chain code, got {}",
                CHAIN_CODE_SIZE,
                chain_code.len()
            )));
        }

        let secret = SecretKey::from_slice(private_key)
            .map_err(|_| KeyTreeError::InvalidKeyMaterial("private key out of range".into()))?;
        let mut code = [0u8; CHAIN_CODE_SIZE];
        code.copy_from_slice(chain_code);

        Ok(Self::from_secret(secret, ChainCode(code)))
    }

    fn from_secret(secret: SecretKey, chain_code: ChainCode) -> Self {
        let public = secret.public_key();
        Self {
            secret,
            public,
            chain_code,
        }
    }

    fn from_scalar(scalar: Scalar, chain_code: ChainCode) -> Result<Self, KeyTreeError> {
        let scalar: Option<NonZeroScalar> = NonZeroScalar::new(scalar).into();
        let scalar = scalar.ok_or(KeyTreeError::InvalidSeed)?;
        Ok(Self::from_secret(SecretKey::from(scalar), chain_code))
    }

    /// Derive the child at `index`
    ///
    /// Indices with [`HARDENED_BIT`] set mix in the parent private key,
    /// all others the parent public point.
    ///
    /// # Errors
    ///
    /// Returns [`KeyTreeError::InvalidChildKey`] when `parse256(I_L) >= N`
    /// or the resulting scalar is zero. No invalid key is ever returned.
    pub fn derive_child(&self, index: u32) -> Result<Self, KeyTreeError> {
        let mut message = Zeroizing::new(Vec::with_capacity(PUBLIC_KEY_SIZE + 4));
        if is_hardened(index) {
            message.push(0x00);
            message.extend_from_slice(self.private_key_bytes().as_ref());
        } else {
            message.extend_from_slice(&self.public_key_bytes());
        }
        message.extend_from_slice(&ser32(index));

        let i = hmac_sha512(self.chain_code.as_bytes(), &message)?;
        let (il, ir) = split(&i);

        let tweak = parse256(&il).ok_or(KeyTreeError::InvalidChildKey(index))?;
        let child = *self.secret.to_nonzero_scalar() + tweak;

        Self::from_scalar(child, ChainCode(*ir)).map_err(|_| KeyTreeError::InvalidChildKey(index))
    }

    /// Derive a child, applying `policy` when the index yields an invalid key
    ///
    /// Returns the child together with the index actually used.
    pub fn derive_child_with_policy(
        &self,
        index: u32,
        policy: DerivationPolicy,
    ) -> Result<(Self, u32), KeyTreeError> {
        let mut index = index;
        loop {
            match self.derive_child(index) {
                Ok(child) => return Ok((child, index)),
                Err(KeyTreeError::InvalidChildKey(_)) if policy == DerivationPolicy::NextIndex => {
                    let next = next_index(index).ok_or(KeyTreeError::InvalidChildKey(index))?;
                    tracing::warn!(index, next, "child key out of range, trying next index");
                    index = next;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The private scalar as 32 big-endian bytes, zeroed when dropped
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_SIZE]> {
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// `serP` of the public point: raw `X ∥ Y`
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        ser_p(&self.public)
    }

    /// Uncompressed SEC1 encoding of the public point
    pub fn public_key_sec1(&self) -> [u8; SEC1_UNCOMPRESSED_SIZE] {
        let mut out = [0u8; SEC1_UNCOMPRESSED_SIZE];
        out.copy_from_slice(self.public.to_encoded_point(false).as_bytes());
        out
    }

    pub fn chain_code(&self) -> &ChainCode {
        &self.chain_code
    }

    /// Ledger address of this key
    pub fn owner_address(&self) -> OwnerAddress {
        OwnerAddress::from_public_key(&self.public)
    }
}

/// Whether `index` selects hardened derivation
pub fn is_hardened(index: u32) -> bool {
    index & HARDENED_BIT != 0
}

/// The index after `index` in the same half of the index space
///
/// `None` at the last normal (`0x7fff_ffff`) and last hardened
/// (`u32::MAX`) index.
pub fn next_index(index: u32) -> Option<u32> {
    index
        .checked_add(1)
        .filter(|next| is_hardened(*next) == is_hardened(index))
}

/// Serialize a 32-bit integer as 4 big-endian bytes
pub fn ser32(index: u32) -> [u8; 4] {
    index.to_be_bytes()
}

/// Serialize a scalar as 32 big-endian bytes, zero padded
pub fn ser256(scalar: &Scalar) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&scalar.to_bytes());
    out
}

/// Interpret 32 big-endian bytes as a scalar
///
/// Returns `None` when the value is not below the curve order.
pub fn parse256(bytes: &[u8; 32]) -> Option<Scalar> {
    Scalar::from_repr(*FieldBytes::from_slice(bytes)).into()
}

/// Serialize a public point as the raw concatenation `X ∥ Y`
pub fn ser_p(point: &PublicKey) -> [u8; PUBLIC_KEY_SIZE] {
    let encoded = point.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_SIZE];
    // skip the 0x04 tag of the uncompressed encoding
    out.copy_from_slice(&encoded.as_bytes()[1..]);
    out
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<Zeroizing<[u8; 64]>, KeyTreeError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| KeyTreeError::InvalidKeyMaterial(e.to_string()))?;
    mac.update(data);

    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split(i: &[u8; 64]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut il = Zeroizing::new([0u8; 32]);
    let mut ir = Zeroizing::new([0u8; 32]);
    il.copy_from_slice(&i[..32]);
    ir.copy_from_slice(&i[32..]);
    (il, ir)
}
