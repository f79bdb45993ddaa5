//! Object Storage Backend
//!
//! A content-addressed [`BlobStore`](common::chain::BlobStore) over pluggable
//! object storage (S3/MinIO/local filesystem/memory).
//!
//! # Features
//!
//! - Blob ids are CIDv1 with a BLAKE3 multihash, identical to the in-memory store
//! - Writes are idempotent; storing the same bytes twice is a no-op
//! - Reads verify the bytes against their id
//!
//! # Example
//!
//! ```rust,no_run
//! use common::chain::BlobStore;
//! use object_blob_store::ObjectBlobStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ObjectBlobStore::new_ephemeral().await?;
//! let id = store.put(b"sealed record".to_vec()).await?;
//! let data = store.get(&id).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod object_store;
mod storage;

pub use error::{ObjectStoreError, Result};
pub use crate::object_store::ObjectBlobStore;
pub use storage::ObjectStoreConfig;
