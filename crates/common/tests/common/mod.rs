//! Shared test utilities for chain and session integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::chain::{BlobId, BlobStore, BlobStoreError, MemoryBlobStore};
use common::crypto::{
    encrypt_for_recipient, EncryptedEnvelope, ExtendedKey, HybridCiphertext, OwnerAddress,
    Payload, Secret,
};
use common::ledger::{HeadReceipt, HeadUpdate, Ledger, LedgerError, LedgerSigner, MemoryLedger};

/// Blob store that counts calls and can be told to fail puts
#[derive(Debug, Clone, Default)]
pub struct CountingBlobStore {
    pub inner: MemoryBlobStore,
    pub puts: Arc<AtomicUsize>,
    pub gets: Arc<AtomicUsize>,
    pub fail_puts: Arc<std::sync::atomic::AtomicBool>,
}

impl CountingBlobStore {
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn put(&self, data: Vec<u8>) -> Result<BlobId, BlobStoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Transport("injected put failure".into()));
        }
        self.inner.put(data).await
    }

    async fn get(&self, id: &BlobId) -> Result<Bytes, BlobStoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }
}

/// Ledger that counts calls and can be told to fail head updates
#[derive(Debug, Clone, Default)]
pub struct CountingLedger {
    pub inner: MemoryLedger,
    pub get_heads: Arc<AtomicUsize>,
    pub set_heads: Arc<AtomicUsize>,
    pub fail_set_head: Arc<std::sync::atomic::AtomicBool>,
}

impl CountingLedger {
    pub fn set_heads(&self) -> usize {
        self.set_heads.load(Ordering::SeqCst)
    }

    pub fn fail_set_head(&self, fail: bool) {
        self.fail_set_head.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Ledger for CountingLedger {
    async fn get_head(&self, address: &OwnerAddress) -> Result<String, LedgerError> {
        self.get_heads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_head(address).await
    }

    async fn set_head(
        &self,
        update: &HeadUpdate,
        signer: &LedgerSigner,
    ) -> Result<HeadReceipt, LedgerError> {
        self.set_heads.fetch_add(1, Ordering::SeqCst);
        if self.fail_set_head.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("injected set_head failure".into()));
        }
        self.inner.set_head(update, signer).await
    }
}

/// Master key used across tests
pub fn master_key() -> ExtendedKey {
    ExtendedKey::from_seed(&[0u8; 32]).unwrap()
}

/// A sealed record addressed to `master`, carrying `body`
pub fn sealed_record(master: &ExtendedKey, body: &[u8]) -> (HybridCiphertext, EncryptedEnvelope) {
    let secret = Secret::generate().unwrap();
    let hybrid = encrypt_for_recipient(&master.public_key_bytes(), secret.bytes()).unwrap();
    let envelope = secret.encrypt(&Payload::Raw(body.to_vec())).unwrap();
    (hybrid, envelope)
}

/// Open a record produced by [`sealed_record`]
pub fn open_record(
    master: &ExtendedKey,
    hybrid: &HybridCiphertext,
    envelope: &EncryptedEnvelope,
) -> Vec<u8> {
    let key = common::crypto::decrypt_with_private_key(master.secret_key(), hybrid).unwrap();
    Secret::from_slice(&key).unwrap().decrypt(envelope).unwrap()
}
