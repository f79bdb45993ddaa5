//! Cryptographic primitives for sealchain
//!
//! This module provides everything needed to derive, seal and open
//! per-application credentials:
//!
//! - **Key derivation**: BIP32-style hierarchical keys over secp256k1 ([`ExtendedKey`])
//! - **Symmetric sealing**: AES-256-GCM envelopes with a fresh nonce per call ([`Secret`])
//! - **Hybrid sealing**: ECIES-style encryption to a public key ([`encrypt_for_recipient`])
//! - **Identity**: the ledger address of a master key ([`OwnerAddress`])
//!
//! # Security Model
//!
//! ## Master key
//! A single master [`ExtendedKey`] is generated from a seed. It never leaves
//! the process unsealed: on disk it is stored as a credential envelope under
//! a local vault [`Secret`] (see [`seal_root_key`]).
//!
//! ## Session credentials
//! For every application a hardened child is derived at an index taken from
//! `SHA-256(origin)`. Its key material is packed into a [`CredentialPayload`]
//! and sealed under a fresh random session key `K`. `K` itself is sealed to
//! the master public key with [`encrypt_for_recipient`], so only the master
//! key holder can recover any session credential:
//!
//! 1. Draw an ephemeral scalar `r` and compute the shared point `r·P_master`
//! 2. Hash the fixed-width `X ∥ Y` of the shared point with SHA-256
//! 3. Seal `K` with AES-256-GCM under that hash
//! 4. Append the ephemeral point and a one-byte envelope length
//!
//! To recover, the master key holder recomputes the shared point from the
//! ephemeral point, opens `K`, then opens the credential envelope with `K`.
//!
//! Private key material is wiped from memory when the owning value drops.

mod address;
mod hybrid;
mod key_tree;
mod payload;
mod secret;
mod vault;

pub use address::{AddressError, OwnerAddress, ADDRESS_SIZE};
pub use hybrid::{
    decrypt_with_private_key, encrypt_for_recipient, parse_public_key, HybridCiphertext,
    MAX_ENVELOPE_SIZE,
};
pub use key_tree::{
    is_hardened, next_index, parse256, ser256, ser32, ser_p, ChainCode, DerivationPolicy,
    ExtendedKey, KeyTreeError, CHAIN_CODE_SIZE, HARDENED_BIT, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
    SEC1_UNCOMPRESSED_SIZE,
};
pub use payload::{CredentialPayload, Payload, PayloadError, CREDENTIAL_HEADER_SIZE};
pub use secret::{CipherError, EncryptedEnvelope, Secret, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};
pub use vault::{open_root_key, seal_root_key, VaultError};
