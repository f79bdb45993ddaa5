use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use cid::multihash::Multihash;
use cid::Cid;

/// Identifier of an immutable blob
pub type BlobId = String;

/// Multicodec code for raw binary content
pub const RAW_CODEC: u64 = 0x55;
/// Multihash code for BLAKE3-256
pub const BLAKE3_HASH_CODE: u64 = 0x1e;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BlobStoreError {
    #[error("blob not found: {0}")]
    NotFound(BlobId),
    #[error("blob store transport error: {0}")]
    Transport(String),
}

impl BlobStoreError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, BlobStoreError::Transport(_))
    }
}

/// Content-addressed, immutable blob storage
///
/// Storing identical bytes twice must return the same id.
#[async_trait]
pub trait BlobStore: Send + Sync + Debug + 'static {
    async fn put(&self, data: Vec<u8>) -> Result<BlobId, BlobStoreError>;

    async fn get(&self, id: &BlobId) -> Result<Bytes, BlobStoreError>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn put(&self, data: Vec<u8>) -> Result<BlobId, BlobStoreError> {
        (**self).put(data).await
    }

    async fn get(&self, id: &BlobId) -> Result<Bytes, BlobStoreError> {
        (**self).get(id).await
    }
}

/// CIDv1 (raw codec, BLAKE3 multihash) of `data` in its base32 text form
pub fn content_id(data: &[u8]) -> Result<BlobId, BlobStoreError> {
    let hash = blake3::hash(data);
    let multihash = Multihash::<64>::wrap(BLAKE3_HASH_CODE, hash.as_bytes())
        .map_err(|e| BlobStoreError::Transport(format!("failed to build multihash: {}", e)))?;
    Ok(Cid::new_v1(RAW_CODEC, multihash).to_string())
}

/// In-memory blob store
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<HashMap<BlobId, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Vec<u8>) -> Result<BlobId, BlobStoreError> {
        let id = content_id(&data)?;
        let mut inner = self.inner.write().map_err(|e| {
            BlobStoreError::Transport(format!("failed to acquire write lock: {}", e))
        })?;
        inner.entry(id.clone()).or_insert_with(|| Bytes::from(data));
        tracing::debug!(%id, "stored blob");
        Ok(id)
    }

    async fn get(&self, id: &BlobId) -> Result<Bytes, BlobStoreError> {
        let inner = self.inner.read().map_err(|e| {
            BlobStoreError::Transport(format!("failed to acquire read lock: {}", e))
        })?;
        inner
            .get(id)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_content_id_is_cid_v1() {
        let id = content_id(b"hello").unwrap();
        let cid: Cid = id.parse().unwrap();
        assert_eq!(cid.version(), cid::Version::V1);
        assert_eq!(cid.codec(), RAW_CODEC);
        assert_eq!(cid.hash().code(), BLAKE3_HASH_CODE);
        assert_eq!(cid.hash().digest(), blake3::hash(b"hello").as_bytes());
        assert_ne!(id, content_id(b"hello!").unwrap());
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"same".to_vec()).await.unwrap();
        let b = store.put(b"same".to_vec()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a).await.unwrap(), Bytes::from_static(b"same"));
    }

    #[tokio::test]
    async fn test_missing_blob() {
        let store = MemoryBlobStore::new();
        let id = content_id(b"never stored").unwrap();
        assert_eq!(
            store.get(&id).await,
            Err(BlobStoreError::NotFound(id.clone()))
        );
    }
}
