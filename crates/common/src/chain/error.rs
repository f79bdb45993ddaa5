use serde::{Deserialize, Serialize};

use super::blobs::{BlobId, BlobStoreError};
use crate::crypto::CipherError;
use crate::ledger::LedgerError;

/// Blobs that were stored but never pointed to by the ledger
///
/// Hand it to [`ChainStore::retry_head_update`](super::ChainStore::retry_head_update)
/// to commit the append without uploading anything again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedAppend {
    /// Head the append was based on, empty for a new chain
    pub previous_head: String,
    pub pair_id: BlobId,
    pub list_id: BlobId,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("blob store error: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("blobs stored as {} but the head update failed: {source}", .orphan.list_id)]
    StoreFailed {
        orphan: OrphanedAppend,
        source: LedgerError,
    },
    #[error("shut down before anything was stored")]
    Shutdown,
    #[error("cancelled after storing {}", .orphan.list_id)]
    Cancelled { orphan: OrphanedAppend },
    #[error("malformed chain blob: {0}")]
    Malformed(String),
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}

impl ChainError {
    /// Whether retrying may succeed
    ///
    /// An orphan whose head update hit a conflict is committed by
    /// [`ChainStore::retry_head_update`](super::ChainStore::retry_head_update)
    /// on top of the newer head.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChainError::Blob(e) => e.is_retryable(),
            ChainError::Ledger(e) => e.is_retryable(),
            ChainError::StoreFailed { source, .. } => {
                source.is_retryable() || matches!(source, LedgerError::Conflict { .. })
            }
            ChainError::Cancelled { .. } => true,
            _ => false,
        }
    }

    /// The stored but unreferenced blobs, if any
    pub fn orphan(&self) -> Option<&OrphanedAppend> {
        match self {
            ChainError::StoreFailed { orphan, .. } | ChainError::Cancelled { orphan } => {
                Some(orphan)
            }
            _ => None,
        }
    }
}
