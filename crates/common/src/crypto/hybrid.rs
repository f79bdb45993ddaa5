//! Hybrid (ECIES-style) encryption to a secp256k1 public key
//!
//! An ephemeral scalar `r` is drawn for each call. The symmetric key is
//! `SHA-256(X ∥ Y)` of the shared point `r·P`, and the plaintext is sealed
//! as a raw [`EncryptedEnvelope`](super::EncryptedEnvelope). Output layout:
//!
//! ```text
//! [ envelope ][ ephemeral point, uncompressed SEC1: 65 ][ len(envelope): 1 ]
//! ```
//!
//! The trailing length byte caps envelopes at 255 bytes, i.e. plaintexts of
//! at most 227 bytes. Larger inputs are rejected with
//! [`CipherError::EnvelopeTooLarge`].

use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::key_tree::{PUBLIC_KEY_SIZE, SEC1_UNCOMPRESSED_SIZE};
use super::secret::{fill_random, CipherError, EncryptedEnvelope, Secret, NONCE_SIZE, TAG_SIZE};

/// Largest envelope the one-byte length marker can describe
pub const MAX_ENVELOPE_SIZE: usize = u8::MAX as usize;

/// `envelope ∥ ephemeral point ∥ len(envelope)`
///
/// Always structurally valid: constructing one from bytes checks the length
/// marker against the actual size.
#[derive(Clone, PartialEq, Eq)]
pub struct HybridCiphertext(Vec<u8>);

impl std::fmt::Debug for HybridCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HybridCiphertext({} bytes)", self.0.len())
    }
}

impl HybridCiphertext {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CipherError> {
        let Some(&marker) = bytes.last() else {
            return Err(CipherError::MalformedCiphertext("empty ciphertext".into()));
        };
        let envelope_len = marker as usize;
        let expected = envelope_len + SEC1_UNCOMPRESSED_SIZE + 1;
        if bytes.len() != expected {
            return Err(CipherError::MalformedCiphertext(format!(
                "length marker says {} bytes total, got {}",
                expected,
                bytes.len()
            )));
        }
        if envelope_len < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::MalformedCiphertext(format!(
                "envelope of {} bytes cannot hold nonce and tag",
                envelope_len
            )));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| CipherError::MalformedCiphertext(format!("invalid hex: {}", e)))?;
        Self::from_bytes(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    fn envelope_len(&self) -> usize {
        self.0[self.0.len() - 1] as usize
    }

    /// The symmetric envelope at the front
    pub fn envelope(&self) -> &[u8] {
        &self.0[..self.envelope_len()]
    }

    /// The ephemeral point, uncompressed SEC1
    pub fn ephemeral_public(&self) -> &[u8] {
        let start = self.envelope_len();
        &self.0[start..start + SEC1_UNCOMPRESSED_SIZE]
    }
}

/// Parse a recipient key given as SEC1 (compressed or not) or raw `X ∥ Y`
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CipherError> {
    if bytes.len() == PUBLIC_KEY_SIZE {
        let mut sec1 = [0u8; SEC1_UNCOMPRESSED_SIZE];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(bytes);
        return PublicKey::from_sec1_bytes(&sec1).map_err(|_| CipherError::InvalidPublicKey);
    }
    PublicKey::from_sec1_bytes(bytes).map_err(|_| CipherError::InvalidPublicKey)
}

/// Seal `plaintext` so only the holder of the private key for `recipient`
/// can open it
pub fn encrypt_for_recipient(
    recipient: &[u8],
    plaintext: &[u8],
) -> Result<HybridCiphertext, CipherError> {
    let recipient = parse_public_key(recipient)?;

    let envelope_len = NONCE_SIZE + plaintext.len() + TAG_SIZE;
    if envelope_len > MAX_ENVELOPE_SIZE {
        return Err(CipherError::EnvelopeTooLarge(envelope_len));
    }

    let ephemeral = random_secret_key()?;
    let key = shared_key(&recipient, &ephemeral)?;
    let envelope = key.seal(&[], plaintext)?;
    debug_assert_eq!(envelope.len(), envelope_len);

    let ephemeral_public = ephemeral.public_key().to_encoded_point(false);

    let mut out = Vec::with_capacity(envelope_len + SEC1_UNCOMPRESSED_SIZE + 1);
    out.extend_from_slice(envelope.as_bytes());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.push(envelope_len as u8);
    Ok(HybridCiphertext(out))
}

/// Open a [`HybridCiphertext`] with the recipient's private key
pub fn decrypt_with_private_key(
    private_key: &SecretKey,
    ciphertext: &HybridCiphertext,
) -> Result<Vec<u8>, CipherError> {
    let ephemeral = PublicKey::from_sec1_bytes(ciphertext.ephemeral_public()).map_err(|_| {
        CipherError::MalformedCiphertext("ephemeral point is not on the curve".into())
    })?;
    let key = shared_key(&ephemeral, private_key)?;
    key.decrypt(&EncryptedEnvelope::from(ciphertext.envelope().to_vec()))
}

/// `SHA-256(X ∥ Y)` of `scalar · point`, both coordinates fixed width
fn shared_key(point: &PublicKey, scalar: &SecretKey) -> Result<Secret, CipherError> {
    let shared = (point.to_projective() * *scalar.to_nonzero_scalar()).to_affine();
    let encoded = shared.to_encoded_point(false);
    if encoded.len() != SEC1_UNCOMPRESSED_SIZE {
        return Err(CipherError::InvalidPublicKey);
    }
    let secret = Zeroizing::new(encoded.as_bytes()[1..].to_vec());
    let digest: [u8; 32] = Sha256::digest(&*secret).into();
    Ok(Secret::from(digest))
}

/// Uniform scalar in `[1, N-1]` by rejection sampling
fn random_secret_key() -> Result<SecretKey, CipherError> {
    loop {
        let mut candidate = Zeroizing::new([0u8; 32]);
        fill_random(candidate.as_mut())?;
        if let Ok(secret) = SecretKey::from_slice(candidate.as_ref()) {
            return Ok(secret);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::ExtendedKey;

    fn recipient() -> ExtendedKey {
        ExtendedKey::from_seed(b"hybrid recipient").unwrap()
    }

    #[test]
    fn test_round_trip_raw_xy_recipient() {
        let key = recipient();
        let plaintext = b"thirty-two byte session key here";

        let ciphertext = encrypt_for_recipient(&key.public_key_bytes(), plaintext).unwrap();
        assert_eq!(
            ciphertext.as_bytes().len(),
            NONCE_SIZE + plaintext.len() + TAG_SIZE + SEC1_UNCOMPRESSED_SIZE + 1
        );
        assert_eq!(ciphertext.ephemeral_public()[0], 0x04);

        let opened = decrypt_with_private_key(key.secret_key(), &ciphertext).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_round_trip_sec1_recipients() {
        let key = recipient();
        let compressed = key.public_key().to_encoded_point(true);
        for encoded in [&key.public_key_sec1()[..], compressed.as_bytes()] {
            let ciphertext = encrypt_for_recipient(encoded, b"payload").unwrap();
            let opened = decrypt_with_private_key(key.secret_key(), &ciphertext).unwrap();
            assert_eq!(opened, b"payload");
        }
    }

    #[test]
    fn test_invalid_recipient() {
        assert!(matches!(
            encrypt_for_recipient(&[0u8; 64], b"x"),
            Err(CipherError::InvalidPublicKey)
        ));
        assert!(matches!(
            encrypt_for_recipient(&[1u8; 12], b"x"),
            Err(CipherError::InvalidPublicKey)
        ));
    }

    #[test]
    fn test_wrong_private_key() {
        let ciphertext = encrypt_for_recipient(&recipient().public_key_bytes(), b"x").unwrap();
        let other = ExtendedKey::from_seed(b"someone else").unwrap();
        assert!(matches!(
            decrypt_with_private_key(other.secret_key(), &ciphertext),
            Err(CipherError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_envelope_bit_flip() {
        let key = recipient();
        let ciphertext = encrypt_for_recipient(&key.public_key_bytes(), b"secret").unwrap();
        let mut bytes = ciphertext.into_bytes();
        bytes[NONCE_SIZE] ^= 0x80;
        let tampered = HybridCiphertext::from_bytes(bytes).unwrap();
        assert!(matches!(
            decrypt_with_private_key(key.secret_key(), &tampered),
            Err(CipherError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_truncated_is_malformed() {
        let ciphertext = encrypt_for_recipient(&recipient().public_key_bytes(), b"abc").unwrap();
        let mut bytes = ciphertext.into_bytes();
        bytes.remove(0);
        assert!(matches!(
            HybridCiphertext::from_bytes(bytes),
            Err(CipherError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            HybridCiphertext::from_bytes(Vec::new()),
            Err(CipherError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_off_curve_ephemeral_is_malformed() {
        let key = recipient();
        let ciphertext = encrypt_for_recipient(&key.public_key_bytes(), b"abc").unwrap();
        let envelope_len = ciphertext.envelope().len();
        let mut bytes = ciphertext.into_bytes();
        bytes[envelope_len + 1..envelope_len + SEC1_UNCOMPRESSED_SIZE].fill(0xff);
        let tampered = HybridCiphertext::from_bytes(bytes).unwrap();
        assert!(matches!(
            decrypt_with_private_key(key.secret_key(), &tampered),
            Err(CipherError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_envelope_size_limit() {
        let key = recipient().public_key_bytes();
        let largest = vec![7u8; MAX_ENVELOPE_SIZE - NONCE_SIZE - TAG_SIZE];
        assert!(encrypt_for_recipient(&key, &largest).is_ok());

        let too_big = vec![7u8; largest.len() + 1];
        assert!(matches!(
            encrypt_for_recipient(&key, &too_big),
            Err(CipherError::EnvelopeTooLarge(256))
        ));
    }
}
