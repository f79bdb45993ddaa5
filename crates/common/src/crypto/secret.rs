//! Symmetric sealing using AES-256-GCM
//!
//! A [`Secret`] seals a [`Payload`] into an [`EncryptedEnvelope`]. Every call
//! draws a fresh 96-bit nonce from the OS generator, so sealing the same
//! payload twice never yields the same bytes.
//!
//! Envelope layouts:
//!
//! ```text
//! raw:        [ nonce: 12 ][ ciphertext ][ tag: 16 ]
//! credential: [ nonce: 12 ][ priv_len: 1 ][ pub_len: 1 ][ ciphertext ][ tag: 16 ]
//! ```
//!
//! The two length bytes of a credential envelope are authenticated as
//! associated data, so tampering with them fails the tag check like any
//! other bit flip.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload as AeadPayload},
    Aes256Gcm, Key, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::payload::{CredentialPayload, Payload, PayloadError, CREDENTIAL_HEADER_SIZE};

/// Size of the AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;
/// Size of an AES-256 key in bytes
pub const SECRET_SIZE: usize = 32;

/// Errors raised while sealing or opening ciphertexts
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("public key is not a valid secp256k1 point")]
    InvalidPublicKey,
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),
    #[error("authentication failed")]
    AuthenticationFailure,
    #[error("envelope is {0} bytes, the length marker holds at most 255")]
    EnvelopeTooLarge(usize),
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("random generator failure: {0}")]
    Random(String),
}

/// Fill `buf` from the OS random generator
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), CipherError> {
    getrandom::getrandom(buf).map_err(|e| CipherError::Random(e.to_string()))
}

/// Sealed bytes produced by [`Secret::encrypt`]
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope(Vec<u8>);

impl std::fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedEnvelope({} bytes)", self.0.len())
    }
}

impl EncryptedEnvelope {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, CipherError> {
        hex::decode(hex_str)
            .map(Self)
            .map_err(|e| CipherError::MalformedCiphertext(format!("invalid hex: {}", e)))
    }
}

impl From<Vec<u8>> for EncryptedEnvelope {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for EncryptedEnvelope {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 256-bit AES-GCM key
///
/// Wiped from memory when dropped.
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate()?;
/// let envelope = secret.encrypt(&Payload::Raw(b"hello".to_vec()))?;
/// assert_eq!(secret.decrypt(&envelope)?, b"hello");
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_SIZE]);

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret from the OS generator
    pub fn generate() -> Result<Self, CipherError> {
        let mut buff = [0; SECRET_SIZE];
        fill_random(&mut buff)?;
        Ok(Self(buff))
    }

    /// Create a secret from a byte slice of exactly [`SECRET_SIZE`] bytes
    pub fn from_slice(data: &[u8]) -> Result<Self, CipherError> {
        if data.len() != SECRET_SIZE {
            return Err(CipherError::MalformedCiphertext(format!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )));
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, CipherError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_str.trim())
                .map_err(|e| CipherError::MalformedCiphertext(format!("invalid hex: {}", e)))?,
        );
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Seal `payload` under a fresh random nonce
    pub fn encrypt(&self, payload: &Payload) -> Result<EncryptedEnvelope, CipherError> {
        match payload {
            Payload::Raw(data) => self.seal(&[], data),
            Payload::Credential(credential) => {
                let header = credential.header()?;
                let body = Zeroizing::new(credential.body());
                self.seal(&header, &body)
            }
        }
    }

    /// Open a raw envelope
    ///
    /// Fails closed: on any tag mismatch nothing is returned.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CipherError> {
        let data = envelope.as_bytes();
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::MalformedCiphertext(format!(
                "envelope is {} bytes, shorter than nonce and tag",
                data.len()
            )));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        self.open(nonce, &[], ciphertext)
    }

    /// Open a credential envelope and parse the credential it carries
    pub fn open_credential(
        &self,
        envelope: &EncryptedEnvelope,
    ) -> Result<CredentialPayload, CipherError> {
        let data = envelope.as_bytes();
        let min = NONCE_SIZE + CREDENTIAL_HEADER_SIZE + TAG_SIZE;
        if data.len() < min {
            return Err(CipherError::MalformedCiphertext(format!(
                "credential envelope is {} bytes, need at least {}",
                data.len(),
                min
            )));
        }
        let (nonce, rest) = data.split_at(NONCE_SIZE);
        let (header, ciphertext) = rest.split_at(CREDENTIAL_HEADER_SIZE);

        let body = Zeroizing::new(self.open(nonce, header, ciphertext)?);
        let credential = CredentialPayload::from_parts([header[0], header[1]], &body)?;
        Ok(credential)
    }

    /// `nonce ∥ aad ∥ AES-GCM(msg, aad)`
    pub(crate) fn seal(&self, aad: &[u8], msg: &[u8]) -> Result<EncryptedEnvelope, CipherError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.bytes()));

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        fill_random(&mut nonce_bytes)?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, AeadPayload { msg, aad })
            .map_err(|_| CipherError::MalformedCiphertext("encrypt error".into()))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + aad.len() + ciphertext.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(aad);
        out.extend_from_slice(&ciphertext);
        Ok(EncryptedEnvelope(out))
    }

    fn open(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.bytes()));
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                AeadPayload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CipherError::AuthenticationFailure)
    }
}
