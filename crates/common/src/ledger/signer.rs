//! Signing of head updates
//!
//! Head updates are signed with the master key using recoverable ECDSA over
//! `keccak256(message)`, where
//!
//! ```text
//! message = address(20) ∥ len(previous)(4) ∥ previous ∥ len(head)(4) ∥ head ∥ nonce(8)
//! ```
//!
//! Lengths and the nonce are big-endian. A ledger recovers the signing key
//! from the signature and checks it maps to the target address.

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::PublicKey;
use sha3::{Digest, Keccak256};

use super::provider::{HeadUpdate, LedgerError};
use crate::crypto::{ExtendedKey, OwnerAddress};

/// Size of a recoverable signature: `r ∥ s ∥ v`
pub const SIGNATURE_SIZE: usize = 65;

/// Signs head updates on behalf of one owner address
#[derive(Clone)]
pub struct LedgerSigner {
    signing_key: SigningKey,
    address: OwnerAddress,
}

impl fmt::Debug for LedgerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LedgerSigner {
    pub fn from_key(key: &ExtendedKey) -> Self {
        Self {
            signing_key: SigningKey::from(key.secret_key().clone()),
            address: key.owner_address(),
        }
    }

    pub fn address(&self) -> &OwnerAddress {
        &self.address
    }

    /// Hex encoded recoverable signature of `update` at `nonce`
    pub fn sign(&self, update: &HeadUpdate, nonce: u64) -> Result<String, LedgerError> {
        let prehash = update_prehash(update, nonce);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| LedgerError::TransactionRejected(format!("signing failed: {}", e)))?;

        let mut out = Vec::with_capacity(SIGNATURE_SIZE);
        out.extend_from_slice(&signature.to_bytes());
        out.push(recovery_id.to_byte());
        Ok(hex::encode(out))
    }
}

/// Address of the key that produced `signature` over `update` at `nonce`
pub fn recover_signer(
    update: &HeadUpdate,
    nonce: u64,
    signature: &str,
) -> Result<OwnerAddress, LedgerError> {
    let reject = |reason: &str| LedgerError::TransactionRejected(reason.to_string());

    let bytes = hex::decode(signature).map_err(|_| reject("signature is not hex"))?;
    if bytes.len() != SIGNATURE_SIZE {
        return Err(reject("signature has the wrong length"));
    }
    let signature = Signature::from_slice(&bytes[..64]).map_err(|_| reject("invalid signature"))?;
    let recovery_id =
        RecoveryId::from_byte(bytes[64]).ok_or_else(|| reject("invalid recovery id"))?;

    let prehash = update_prehash(update, nonce);
    let verifying_key = VerifyingKey::recover_from_prehash(&prehash, &signature, recovery_id)
        .map_err(|_| reject("signature does not recover to a key"))?;
    let public_key =
        PublicKey::from_affine(*verifying_key.as_affine()).map_err(|_| reject("invalid key"))?;
    Ok(OwnerAddress::from_public_key(&public_key))
}

fn update_prehash(update: &HeadUpdate, nonce: u64) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(update.address.as_bytes());
    hasher.update((update.previous.len() as u32).to_be_bytes());
    hasher.update(update.previous.as_bytes());
    hasher.update((update.head.len() as u32).to_be_bytes());
    hasher.update(update.head.as_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod test {
    use super::*;

    fn update_for(key: &ExtendedKey) -> HeadUpdate {
        HeadUpdate {
            address: key.owner_address(),
            previous: String::new(),
            head: "bafkr4head".to_string(),
            fee: 40_000,
        }
    }

    #[test]
    fn test_sign_and_recover() {
        let master = ExtendedKey::from_seed(b"ledger signer").unwrap();
        let signer = LedgerSigner::from_key(&master);
        let update = update_for(&master);

        let signature = signer.sign(&update, 1).unwrap();
        assert_eq!(signature.len(), SIGNATURE_SIZE * 2);
        assert_eq!(
            recover_signer(&update, 1, &signature).unwrap(),
            master.owner_address()
        );
    }

    #[test]
    fn test_signature_bound_to_nonce_and_head() {
        let master = ExtendedKey::from_seed(b"ledger signer").unwrap();
        let signer = LedgerSigner::from_key(&master);
        let update = update_for(&master);
        let signature = signer.sign(&update, 1).unwrap();

        let replayed = recover_signer(&update, 2, &signature);
        assert!(replayed.map_or(true, |address| address != master.owner_address()));

        let mut moved = update.clone();
        moved.head = "bafkr4other".to_string();
        let forged = recover_signer(&moved, 1, &signature);
        assert!(forged.map_or(true, |address| address != master.owner_address()));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let master = ExtendedKey::from_seed(b"ledger signer").unwrap();
        let update = update_for(&master);
        assert!(matches!(
            recover_signer(&update, 1, "zz"),
            Err(LedgerError::TransactionRejected(_))
        ));
        assert!(matches!(
            recover_signer(&update, 1, &hex::encode([1u8; 10])),
            Err(LedgerError::TransactionRejected(_))
        ));
    }
}
