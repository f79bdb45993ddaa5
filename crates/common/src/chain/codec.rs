//! Text forms of the two blob shapes
//!
//! ```text
//! pair: (( hex(hybrid ciphertext) );( hex(envelope) ))
//! list: id_1 \n id_2 \n ... \n id_n        oldest first
//! ```

use super::blobs::BlobId;
use super::error::ChainError;
use crate::crypto::{EncryptedEnvelope, HybridCiphertext};

const PAIR_OPEN: &str = "((";
const PAIR_SEPARATOR: &str = ");(";
const PAIR_CLOSE: &str = "))";
const LIST_DELIMITER: char = '\n';

/// One sealed record: the session key sealed to the master key, and the
/// credential sealed under the session key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairBlob {
    pub hybrid: HybridCiphertext,
    pub envelope: EncryptedEnvelope,
}

impl PairBlob {
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}{}",
            PAIR_OPEN,
            self.hybrid.to_hex(),
            PAIR_SEPARATOR,
            self.envelope.to_hex(),
            PAIR_CLOSE
        )
        .into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ChainError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| ChainError::Malformed("pair blob is not utf-8".into()))?;
        let inner = text
            .strip_prefix(PAIR_OPEN)
            .and_then(|rest| rest.strip_suffix(PAIR_CLOSE))
            .ok_or_else(|| ChainError::Malformed("pair blob is not parenthesized".into()))?;
        let (hybrid, envelope) = inner
            .split_once(PAIR_SEPARATOR)
            .ok_or_else(|| ChainError::Malformed("pair blob has no separator".into()))?;

        Ok(Self {
            hybrid: HybridCiphertext::from_hex(hybrid)?,
            envelope: EncryptedEnvelope::from_hex(envelope)?,
        })
    }
}

/// Ordered ids of every pair blob in a chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBlob(pub Vec<BlobId>);

impl ListBlob {
    pub fn ids(&self) -> &[BlobId] {
        &self.0
    }

    pub fn push(&mut self, id: BlobId) {
        self.0.push(id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(LIST_DELIMITER);
            }
            out.push_str(id);
        }
        out.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ChainError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| ChainError::Malformed("list blob is not utf-8".into()))?;
        let mut ids = Vec::new();
        for id in text.split(LIST_DELIMITER) {
            let id = id.trim();
            if id.is_empty() {
                continue;
            }
            if id.contains(PAIR_OPEN) {
                return Err(ChainError::Malformed(
                    "head points at a pair blob, not a list".into(),
                ));
            }
            ids.push(id.to_string());
        }
        Ok(Self(ids))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{encrypt_for_recipient, ExtendedKey, Payload, Secret};

    fn pair() -> PairBlob {
        let key = ExtendedKey::from_seed(b"codec").unwrap();
        let secret = Secret::generate().unwrap();
        PairBlob {
            hybrid: encrypt_for_recipient(&key.public_key_bytes(), secret.bytes()).unwrap(),
            envelope: secret.encrypt(&Payload::Raw(b"body".to_vec())).unwrap(),
        }
    }

    #[test]
    fn test_pair_text_form() {
        let pair = pair();
        let encoded = String::from_utf8(pair.encode()).unwrap();
        assert!(encoded.starts_with("(("));
        assert!(encoded.ends_with("))"));
        assert_eq!(
            encoded,
            format!("(({});({}))", pair.hybrid.to_hex(), pair.envelope.to_hex())
        );
        assert_eq!(PairBlob::decode(encoded.as_bytes()).unwrap(), pair);
    }

    #[test]
    fn test_pair_malformed() {
        assert!(matches!(
            PairBlob::decode(b"no parens"),
            Err(ChainError::Malformed(_))
        ));
        assert!(matches!(
            PairBlob::decode(b"((abcd))"),
            Err(ChainError::Malformed(_))
        ));
        assert!(matches!(
            PairBlob::decode(b"((00);(00))"),
            Err(ChainError::Cipher(_))
        ));
        assert!(PairBlob::decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_list_text_form() {
        let list = ListBlob(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(list.encode(), b"a\nb\nc");
        assert_eq!(ListBlob::decode(b"a\nb\nc\n").unwrap(), list);
        assert_eq!(ListBlob(vec!["only".into()]).encode(), b"only");
        assert!(ListBlob::decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_list_rejects_pair_blob() {
        let encoded = pair().encode();
        assert!(matches!(
            ListBlob::decode(&encoded),
            Err(ChainError::Malformed(_))
        ));
    }
}
