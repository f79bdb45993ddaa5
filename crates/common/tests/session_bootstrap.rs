//! Integration tests for bootstrapping session credentials

mod common;

use ::common::chain::ChainError;
use ::common::crypto::{ExtendedKey, HARDENED_BIT};
use ::common::session::{Session, SessionError, SessionPhase};
use futures::TryStreamExt;
use sha2::{Digest, Sha256};

use common::{CountingBlobStore, CountingLedger};

const ORIGIN: &str = "https://example.com";

#[tokio::test]
async fn test_first_session_puts_twice_and_sets_head_once() {
    let blobs = CountingBlobStore::default();
    let ledger = CountingLedger::default();
    let mut session = Session::builder(blobs.clone(), ledger.clone())
        .master_key(common::master_key())
        .build();

    let identity = session.request_new_session(ORIGIN).await.unwrap();

    assert_eq!(blobs.puts(), 2);
    assert_eq!(ledger.set_heads(), 1);
    assert_eq!(session.state(), SessionPhase::Stored);

    let records: Vec<_> = session
        .chain()
        .read_chain(&identity.head)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    let opened = session.read_credentials().await.unwrap();
    assert_eq!(opened.len(), 1);
    let expected: [u8; 32] = Sha256::digest(ORIGIN.as_bytes()).into();
    assert_eq!(opened[0].credential.dapp_identifier, expected.to_vec());
    assert_eq!(identity.dapp_identifier, expected);
    assert_eq!(
        identity.child_index,
        HARDENED_BIT | u32::from_be_bytes([expected[0], expected[1], expected[2], expected[3]])
    );
}

#[tokio::test]
async fn test_same_origin_derives_same_child() {
    let mut session = Session::builder(CountingBlobStore::default(), CountingLedger::default())
        .master_key(common::master_key())
        .build();

    let first = session.request_new_session(ORIGIN).await.unwrap();
    let second = session.request_new_session(ORIGIN).await.unwrap();
    assert_eq!(first.public_key, second.public_key);
    assert_ne!(first.head, second.head);

    let opened = session.read_credentials().await.unwrap();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].credential, opened[1].credential);
}

#[tokio::test]
async fn test_failed_store_leaves_no_head() {
    let blobs = CountingBlobStore::default();
    let ledger = CountingLedger::default();
    let mut session = Session::builder(blobs.clone(), ledger.clone())
        .master_key(common::master_key())
        .build();

    blobs.fail_puts(true);
    let err = session.request_new_session(ORIGIN).await.unwrap_err();
    assert!(matches!(err, SessionError::Chain(ChainError::Blob(_))));
    assert_eq!(ledger.set_heads(), 0);
    assert_eq!(session.state(), SessionPhase::MasterKeyLoaded);

    let address = session.owner_address().unwrap();
    assert_eq!(session.chain().head(&address).await.unwrap(), "");
}

#[tokio::test]
async fn test_failed_head_update_is_retryable() {
    let blobs = CountingBlobStore::default();
    let ledger = CountingLedger::default();
    let mut session = Session::builder(blobs.clone(), ledger.clone())
        .master_key(common::master_key())
        .build();

    ledger.fail_set_head(true);
    let err = session.request_new_session(ORIGIN).await.unwrap_err();
    let orphan = match err {
        SessionError::Chain(ref chain) => chain.orphan().cloned().unwrap(),
        other => panic!("expected a chain error, got {:?}", other),
    };
    assert_eq!(blobs.puts(), 2);
    assert!(session.read_credentials().await.unwrap().is_empty());

    ledger.fail_set_head(false);
    let appended = session.retry_head_update(&orphan).await.unwrap();
    assert_eq!(appended.head, orphan.list_id);
    assert_eq!(session.state(), SessionPhase::Stored);
    // retrying uploads nothing new
    assert_eq!(blobs.puts(), 2);

    let opened = session.read_credentials().await.unwrap();
    assert_eq!(opened.len(), 1);
}

#[tokio::test]
async fn test_sessions_are_per_identity() {
    let blobs = CountingBlobStore::default();
    let ledger = CountingLedger::default();

    let mut alice = Session::builder(blobs.clone(), ledger.clone())
        .master_key(common::master_key())
        .build();
    let mut bob = Session::builder(blobs.clone(), ledger.clone())
        .master_key(ExtendedKey::from_seed(b"bob").unwrap())
        .build();

    alice.request_new_session(ORIGIN).await.unwrap();
    bob.request_new_session(ORIGIN).await.unwrap();
    bob.request_new_session("https://bob.example").await.unwrap();

    assert_eq!(alice.read_credentials().await.unwrap().len(), 1);
    assert_eq!(bob.read_credentials().await.unwrap().len(), 2);
}
