//! ObjectBlobStore - content-addressed blob storage on top of `object_store`.
//!
//! Blobs are written under `blobs/<cid>`, where the id is the same CIDv1 the
//! in-memory store produces. Reads re-hash the bytes and refuse anything that
//! no longer matches its id.

use async_trait::async_trait;
use bytes::Bytes;
use common::chain::{content_id, BlobId, BlobStore, BlobStoreError};
use tracing::{debug, info, warn};

use crate::error::{ObjectStoreError, Result};
use crate::storage::{ObjectStoreConfig, Storage};

/// A [`BlobStore`] backed by S3/MinIO, the local filesystem, or memory.
///
/// # Example
///
/// ```rust,no_run
/// use object_blob_store::{ObjectBlobStore, ObjectStoreConfig};
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), object_blob_store::ObjectStoreError> {
/// let store = ObjectBlobStore::new(ObjectStoreConfig::Local {
///     path: PathBuf::from("/tmp/sealchain/blobs"),
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ObjectBlobStore {
    storage: Storage,
    config: ObjectStoreConfig,
}

impl ObjectBlobStore {
    /// Create a store with the given configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let storage = Storage::new(&config).await?;
        info!(backend = backend_name(&config), "opened object blob store");
        Ok(Self { storage, config })
    }

    /// Create a fully ephemeral store.
    pub async fn new_ephemeral() -> Result<Self> {
        Self::new(ObjectStoreConfig::Memory).await
    }

    pub fn config(&self) -> &ObjectStoreConfig {
        &self.config
    }

    /// Store `data` and return its content id.
    pub async fn put_bytes(&self, data: Vec<u8>) -> Result<BlobId> {
        let size = data.len();
        let id = content_id(&data).map_err(|e| ObjectStoreError::InvalidConfig(e.to_string()))?;
        let created = self.storage.put_blob(&id, Bytes::from(data)).await?;
        debug!(%id, size, created, "stored blob");
        Ok(id)
    }

    /// Fetch and verify the blob stored under `id`.
    pub async fn get_bytes(&self, id: &str) -> Result<Option<Bytes>> {
        let Some(data) = self.storage.get_blob(id).await? else {
            return Ok(None);
        };
        match content_id(&data) {
            Ok(actual) if actual == id => Ok(Some(data)),
            _ => {
                warn!(%id, "stored blob does not match its id");
                Err(ObjectStoreError::Corrupt(id.to_string()))
            }
        }
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        self.storage.has_blob(id).await
    }

    /// List the ids of every stored blob.
    pub async fn list(&self) -> Result<Vec<BlobId>> {
        self.storage.list_blob_ids().await
    }
}

fn backend_name(config: &ObjectStoreConfig) -> &'static str {
    match config {
        ObjectStoreConfig::Memory => "memory",
        ObjectStoreConfig::Local { .. } => "local",
        ObjectStoreConfig::S3 { .. } => "s3",
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, data: Vec<u8>) -> std::result::Result<BlobId, BlobStoreError> {
        Ok(self.put_bytes(data).await?)
    }

    async fn get(&self, id: &BlobId) -> std::result::Result<Bytes, BlobStoreError> {
        self.get_bytes(id)
            .await?
            .ok_or_else(|| BlobStoreError::NotFound(id.clone()))
    }
}
