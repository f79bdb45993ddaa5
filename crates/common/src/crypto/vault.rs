//! Local storage of the master key
//!
//! The master key is sealed with a local [`Secret`] using the credential
//! envelope layout and an empty application identifier.

use super::key_tree::{ExtendedKey, KeyTreeError};
use super::payload::{CredentialPayload, Payload};
use super::secret::{CipherError, EncryptedEnvelope, Secret};

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
    #[error("sealed key is invalid: {0}")]
    KeyTree(#[from] KeyTreeError),
    #[error("sealed credential is not a root key")]
    NotARootKey,
}

pub fn seal_root_key(secret: &Secret, key: &ExtendedKey) -> Result<EncryptedEnvelope, VaultError> {
    let payload = Payload::Credential(CredentialPayload::from_key(key, &[]));
    Ok(secret.encrypt(&payload)?)
}

pub fn open_root_key(
    secret: &Secret,
    envelope: &EncryptedEnvelope,
) -> Result<ExtendedKey, VaultError> {
    let credential = secret.open_credential(envelope)?;
    if !credential.dapp_identifier.is_empty() {
        return Err(VaultError::NotARootKey);
    }
    let key = credential.to_extended_key()?;
    // the stored public key must match the one recomputed from the scalar
    if credential.session_public_key != key.public_key_bytes() {
        return Err(VaultError::NotARootKey);
    }
    Ok(key)
}
