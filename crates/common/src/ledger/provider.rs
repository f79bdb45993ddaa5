use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::signer::LedgerSigner;
use crate::crypto::OwnerAddress;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger refused the transaction, e.g. a bad signature
    #[error("transaction rejected: {0}")]
    TransactionRejected(String),
    /// The ledger could not be reached or did not answer in time
    #[error("ledger transport error: {0}")]
    Transport(String),
    /// The head moved since the caller read it
    #[error("head conflict: expected {expected:?}, ledger has {actual:?}")]
    Conflict { expected: String, actual: String },
}

impl LedgerError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Transport(_))
    }
}

/// A request to move the head pointer of `address` from `previous` to `head`
///
/// `previous` is the head the caller based its append on; an empty string
/// means the caller saw no chain yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadUpdate {
    pub address: OwnerAddress,
    pub previous: String,
    pub head: String,
    pub fee: u64,
}

/// Proof that a head update was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadReceipt {
    pub address: OwnerAddress,
    pub head: String,
    /// Per-address transaction counter, starting at 1
    pub nonce: u64,
    pub fee: u64,
    /// Hex of the 65-byte recoverable signature over the update
    pub signature: String,
}

/// Store of one head pointer per owner address
///
/// Implementations must refuse an update whose `previous` no longer matches
/// the stored head with [`LedgerError::Conflict`], and an update not signed
/// by the key behind `address` with [`LedgerError::TransactionRejected`].
#[async_trait]
pub trait Ledger: Send + Sync + Debug + 'static {
    /// Current head of `address`, empty when there is no chain yet
    async fn get_head(&self, address: &OwnerAddress) -> Result<String, LedgerError>;

    /// Sign `update` with `signer` and submit it
    async fn set_head(
        &self,
        update: &HeadUpdate,
        signer: &LedgerSigner,
    ) -> Result<HeadReceipt, LedgerError>;
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for Arc<T> {
    async fn get_head(&self, address: &OwnerAddress) -> Result<String, LedgerError> {
        (**self).get_head(address).await
    }

    async fn set_head(
        &self,
        update: &HeadUpdate,
        signer: &LedgerSigner,
    ) -> Result<HeadReceipt, LedgerError> {
        (**self).set_head(update, signer).await
    }
}
