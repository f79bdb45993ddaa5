//! Error types for the object blob store.

use common::chain::BlobStoreError;

/// Errors that can occur when setting up or using an object-backed blob store.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before use.")]
    BucketNotFound(String),

    /// Stored bytes no longer hash to their id
    #[error("blob {0} failed its content check")]
    Corrupt(String),
}

/// Result type alias for object store operations.
pub type Result<T> = std::result::Result<T, ObjectStoreError>;

impl From<ObjectStoreError> for BlobStoreError {
    fn from(err: ObjectStoreError) -> Self {
        BlobStoreError::Transport(err.to_string())
    }
}
