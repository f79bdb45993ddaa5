//! Plaintext shapes that can be sealed with a [`Secret`](super::Secret)
//!
//! A credential packs into
//!
//! ```text
//! [ priv_len: 1 ][ pub_len: 1 ][ private key ][ public key ][ chain code: 32 ][ dApp identifier: rest ]
//! ```
//!
//! The two length bytes are the *header*; everything after them is the
//! *body*. When sealed, the header travels in the clear right after the
//! nonce and the body is encrypted (see [`super::secret`]).

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::key_tree::{ExtendedKey, CHAIN_CODE_SIZE};

/// Size of the length header of a packed credential
pub const CREDENTIAL_HEADER_SIZE: usize = 2;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("{0} is {1} bytes, at most 255 fit the length header")]
    FieldTooLong(&'static str, usize),
    #[error("packed credential truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },
}

/// Key material of one derived session, plus the application it belongs to
///
/// All fields are wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPayload {
    pub session_private_key: Vec<u8>,
    pub session_public_key: Vec<u8>,
    pub chain_code: [u8; CHAIN_CODE_SIZE],
    pub dapp_identifier: Vec<u8>,
}

impl std::fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPayload")
            .field("session_public_key", &hex::encode(&self.session_public_key))
            .field("dapp_identifier", &hex::encode(&self.dapp_identifier))
            .finish_non_exhaustive()
    }
}

impl CredentialPayload {
    /// Capture the key material of `key` for the given application
    pub fn from_key(key: &ExtendedKey, dapp_identifier: &[u8]) -> Self {
        Self {
            session_private_key: key.private_key_bytes().to_vec(),
            session_public_key: key.public_key_bytes().to_vec(),
            chain_code: *key.chain_code().as_bytes(),
            dapp_identifier: dapp_identifier.to_vec(),
        }
    }

    /// Rebuild the extended key the payload was captured from
    pub fn to_extended_key(&self) -> Result<ExtendedKey, super::KeyTreeError> {
        ExtendedKey::from_parts(&self.session_private_key, &self.chain_code)
    }

    /// The two length bytes that prefix the packed form
    pub fn header(&self) -> Result<[u8; CREDENTIAL_HEADER_SIZE], PayloadError> {
        let private_len = u8::try_from(self.session_private_key.len()).map_err(|_| {
            PayloadError::FieldTooLong("session private key", self.session_private_key.len())
        })?;
        let public_len = u8::try_from(self.session_public_key.len()).map_err(|_| {
            PayloadError::FieldTooLong("session public key", self.session_public_key.len())
        })?;
        Ok([private_len, public_len])
    }

    /// Everything after the header
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(
            self.session_private_key.len()
                + self.session_public_key.len()
                + CHAIN_CODE_SIZE
                + self.dapp_identifier.len(),
        );
        body.extend_from_slice(&self.session_private_key);
        body.extend_from_slice(&self.session_public_key);
        body.extend_from_slice(&self.chain_code);
        body.extend_from_slice(&self.dapp_identifier);
        body
    }

    /// Serialize to `header ∥ body`
    pub fn pack(&self) -> Result<Vec<u8>, PayloadError> {
        let header = self.header()?;
        let mut body = self.body();
        let mut packed = Vec::with_capacity(CREDENTIAL_HEADER_SIZE + body.len());
        packed.extend_from_slice(&header);
        packed.extend_from_slice(&body);
        body.zeroize();
        Ok(packed)
    }

    /// Parse the packed form
    ///
    /// All bytes after the chain code belong to the dApp identifier.
    pub fn unpack(packed: &[u8]) -> Result<Self, PayloadError> {
        if packed.len() < CREDENTIAL_HEADER_SIZE {
            return Err(PayloadError::Truncated {
                needed: CREDENTIAL_HEADER_SIZE,
                actual: packed.len(),
            });
        }
        let header = [packed[0], packed[1]];
        Self::from_parts(header, &packed[CREDENTIAL_HEADER_SIZE..])
    }

    /// Parse a body using an out-of-band header
    pub fn from_parts(
        header: [u8; CREDENTIAL_HEADER_SIZE],
        body: &[u8],
    ) -> Result<Self, PayloadError> {
        let private_len = header[0] as usize;
        let public_len = header[1] as usize;
        let keys_end = private_len + public_len;
        let needed = keys_end + CHAIN_CODE_SIZE;
        if body.len() < needed {
            return Err(PayloadError::Truncated {
                needed: CREDENTIAL_HEADER_SIZE + needed,
                actual: CREDENTIAL_HEADER_SIZE + body.len(),
            });
        }

        let mut chain_code = [0u8; CHAIN_CODE_SIZE];
        chain_code.copy_from_slice(&body[keys_end..needed]);

        Ok(Self {
            session_private_key: body[..private_len].to_vec(),
            session_public_key: body[private_len..keys_end].to_vec(),
            chain_code,
            dapp_identifier: body[needed..].to_vec(),
        })
    }
}

/// Plaintext accepted by [`Secret::encrypt`](super::Secret::encrypt)
///
/// Each case has exactly one serialization, chosen by the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Opaque bytes, sealed as-is
    Raw(Vec<u8>),
    /// A session credential, sealed with its length header bound in the clear
    Credential(CredentialPayload),
}

impl From<CredentialPayload> for Payload {
    fn from(credential: CredentialPayload) -> Self {
        Payload::Credential(credential)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(bytes)
    }
}
