use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::provider::{HeadReceipt, HeadUpdate, Ledger, LedgerError};
use super::signer::{recover_signer, LedgerSigner};
use crate::crypto::OwnerAddress;

/// Head pointer and transaction counter of one address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadEntry {
    pub head: String,
    pub nonce: u64,
}

/// Validate `update` against the stored `entry` and apply it
///
/// Shared by every ledger that keeps its entries locally.
pub(crate) fn apply_update(
    entries: &mut HashMap<OwnerAddress, HeadEntry>,
    update: &HeadUpdate,
    signer: &LedgerSigner,
) -> Result<HeadReceipt, LedgerError> {
    let entry = entries.get(&update.address).cloned().unwrap_or_default();
    let nonce = entry.nonce + 1;

    let signature = signer.sign(update, nonce)?;
    let recovered = recover_signer(update, nonce, &signature)?;
    if recovered != update.address {
        return Err(LedgerError::TransactionRejected(format!(
            "signed by {} but targets {}",
            recovered, update.address
        )));
    }

    if entry.head != update.previous {
        return Err(LedgerError::Conflict {
            expected: update.previous.clone(),
            actual: entry.head,
        });
    }

    entries.insert(
        update.address,
        HeadEntry {
            head: update.head.clone(),
            nonce,
        },
    );

    Ok(HeadReceipt {
        address: update.address,
        head: update.head.clone(),
        nonce,
        fee: update.fee,
        signature,
    })
}

/// In-memory ledger
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<RwLock<HashMap<OwnerAddress, HeadEntry>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted head updates for `address`
    pub fn nonce(&self, address: &OwnerAddress) -> Result<u64, LedgerError> {
        let inner = self.inner.read().map_err(|e| {
            LedgerError::Transport(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner.get(address).map(|entry| entry.nonce).unwrap_or(0))
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_head(&self, address: &OwnerAddress) -> Result<String, LedgerError> {
        let inner = self.inner.read().map_err(|e| {
            LedgerError::Transport(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner
            .get(address)
            .map(|entry| entry.head.clone())
            .unwrap_or_default())
    }

    async fn set_head(
        &self,
        update: &HeadUpdate,
        signer: &LedgerSigner,
    ) -> Result<HeadReceipt, LedgerError> {
        let mut inner = self.inner.write().map_err(|e| {
            LedgerError::Transport(format!("failed to acquire write lock: {}", e))
        })?;
        let receipt = apply_update(&mut inner, update, signer)?;
        tracing::debug!(
            address = %receipt.address,
            head = %receipt.head,
            nonce = receipt.nonce,
            "head updated"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::ExtendedKey;

    fn identity(seed: &[u8]) -> (ExtendedKey, LedgerSigner) {
        let key = ExtendedKey::from_seed(seed).unwrap();
        let signer = LedgerSigner::from_key(&key);
        (key, signer)
    }

    fn update(address: OwnerAddress, previous: &str, head: &str) -> HeadUpdate {
        HeadUpdate {
            address,
            previous: previous.to_string(),
            head: head.to_string(),
            fee: 1,
        }
    }

    #[tokio::test]
    async fn test_empty_head() {
        let ledger = MemoryLedger::new();
        let (key, _) = identity(b"alice");
        assert_eq!(ledger.get_head(&key.owner_address()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_set_and_get_head() {
        let ledger = MemoryLedger::new();
        let (key, signer) = identity(b"alice");
        let address = key.owner_address();

        let receipt = ledger
            .set_head(&update(address, "", "head-1"), &signer)
            .await
            .unwrap();
        assert_eq!(receipt.nonce, 1);
        assert_eq!(receipt.head, "head-1");
        assert_eq!(ledger.get_head(&address).await.unwrap(), "head-1");

        let receipt = ledger
            .set_head(&update(address, "head-1", "head-2"), &signer)
            .await
            .unwrap();
        assert_eq!(receipt.nonce, 2);
        assert_eq!(ledger.get_head(&address).await.unwrap(), "head-2");
        assert_eq!(ledger.nonce(&address).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stale_previous_conflicts() {
        let ledger = MemoryLedger::new();
        let (key, signer) = identity(b"alice");
        let address = key.owner_address();

        ledger
            .set_head(&update(address, "", "head-1"), &signer)
            .await
            .unwrap();
        let result = ledger
            .set_head(&update(address, "", "head-other"), &signer)
            .await;
        assert_eq!(
            result,
            Err(LedgerError::Conflict {
                expected: String::new(),
                actual: "head-1".to_string(),
            })
        );
        assert_eq!(ledger.get_head(&address).await.unwrap(), "head-1");
    }

    #[tokio::test]
    async fn test_wrong_signer_rejected() {
        let ledger = MemoryLedger::new();
        let (alice, _) = identity(b"alice");
        let (_, mallory) = identity(b"mallory");

        let result = ledger
            .set_head(&update(alice.owner_address(), "", "evil"), &mallory)
            .await;
        assert!(matches!(result, Err(LedgerError::TransactionRejected(_))));
        assert_eq!(ledger.get_head(&alice.owner_address()).await.unwrap(), "");
        assert_eq!(ledger.nonce(&alice.owner_address()).unwrap(), 0);
    }
}
