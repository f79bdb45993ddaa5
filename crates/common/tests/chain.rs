//! Integration tests for appending to and reading record chains

mod common;

use ::common::chain::{ChainError, ChainStore, ListBlob};
use ::common::chain::BlobStore;
use ::common::ledger::{LedgerError, LedgerSigner};
use futures::{StreamExt, TryStreamExt};

use common::{CountingBlobStore, CountingLedger};

#[tokio::test]
async fn test_n_appends_read_back_in_order() {
    let master = common::master_key();
    let signer = LedgerSigner::from_key(&master);
    let store = ChainStore::new(CountingBlobStore::default(), CountingLedger::default());

    let mut head = String::new();
    for i in 0..5u8 {
        let (hybrid, envelope) = common::sealed_record(&master, &[i; 8]);
        head = store
            .append_record(&signer, &head, &hybrid, &envelope)
            .await
            .unwrap()
            .head;
    }
    assert_eq!(store.ledger().set_heads(), 5);

    let records: Vec<_> = store.read_chain(&head).try_collect().await.unwrap();
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        let body = common::open_record(&master, &record.hybrid, &record.envelope);
        assert_eq!(body, vec![i as u8; 8]);
    }

    // the head is a list of exactly those pair ids
    let list = ListBlob::decode(&store.blobs().get(&head).await.unwrap()).unwrap();
    assert_eq!(list.len(), 5);
}

#[tokio::test]
async fn test_reader_is_lazy() {
    let master = common::master_key();
    let signer = LedgerSigner::from_key(&master);
    let blobs = CountingBlobStore::default();
    let store = ChainStore::new(blobs.clone(), CountingLedger::default());

    let mut head = String::new();
    for i in 0..3u8 {
        let (hybrid, envelope) = common::sealed_record(&master, &[i]);
        head = store
            .append_record(&signer, &head, &hybrid, &envelope)
            .await
            .unwrap()
            .head;
    }

    let gets_before = blobs.gets();
    let mut reader = store.read_chain(&head);
    assert_eq!(blobs.gets(), gets_before);

    // resolving the head and the first record
    let first = reader.next().await.unwrap().unwrap();
    assert_eq!(blobs.gets(), gets_before + 2);
    assert_eq!(common::open_record(&master, &first.hybrid, &first.envelope), vec![0]);

    let rest: Vec<_> = reader.try_collect().await.unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(blobs.gets(), gets_before + 4);
}

#[tokio::test]
async fn test_stale_previous_head_conflicts() {
    let master = common::master_key();
    let signer = LedgerSigner::from_key(&master);
    let store = ChainStore::new(CountingBlobStore::default(), CountingLedger::default());

    let (h1, e1) = common::sealed_record(&master, b"first");
    let first = store.append_record(&signer, "", &h1, &e1).await.unwrap();

    // a second writer that still believes the chain is empty
    let (h2, e2) = common::sealed_record(&master, b"second");
    let err = store
        .append_record(&signer, "", &h2, &e2)
        .await
        .unwrap_err();
    match err {
        ChainError::StoreFailed {
            source: LedgerError::Conflict { expected, actual },
            ..
        } => {
            assert_eq!(expected, "");
            assert_eq!(actual, first.head);
        }
        other => panic!("expected a conflict, got {:?}", other),
    }

    let address = *signer.address();
    assert_eq!(store.head(&address).await.unwrap(), first.head);
    let records: Vec<_> = store.read_chain(&first.head).try_collect().await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_concurrent_appends_are_serialized() {
    let master = common::master_key();
    let signer = LedgerSigner::from_key(&master);
    let store = ChainStore::new(CountingBlobStore::default(), CountingLedger::default());
    let address = *signer.address();

    // tasks race on the head; a loser re-reads it and tries again
    let mut tasks = Vec::new();
    for i in 0..8u8 {
        let store = store.clone();
        let signer = signer.clone();
        let master = master.clone();
        tasks.push(tokio::spawn(async move {
            let (hybrid, envelope) = common::sealed_record(&master, &[i]);
            loop {
                let head = store.head(&address).await.unwrap();
                match store.append_record(&signer, &head, &hybrid, &envelope).await {
                    Ok(appended) => return appended,
                    Err(ChainError::StoreFailed {
                        source: LedgerError::Conflict { .. },
                        ..
                    }) => continue,
                    Err(e) => panic!("append failed: {}", e),
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let head = store.head(&address).await.unwrap();
    let records: Vec<_> = store.read_chain(&head).try_collect().await.unwrap();
    assert_eq!(records.len(), 8);
}

#[tokio::test]
async fn test_conflicted_append_is_rebased_on_retry() {
    let master = common::master_key();
    let signer = LedgerSigner::from_key(&master);
    let blobs = CountingBlobStore::default();
    let store = ChainStore::new(blobs.clone(), CountingLedger::default());
    let address = *signer.address();

    let (h1, e1) = common::sealed_record(&master, b"first");
    let first = store.append_record(&signer, "", &h1, &e1).await.unwrap();

    let (h2, e2) = common::sealed_record(&master, b"second");
    let err = store
        .append_record(&signer, "", &h2, &e2)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    let orphan = match &err {
        ChainError::StoreFailed {
            orphan,
            source: LedgerError::Conflict { .. },
        } => orphan.clone(),
        other => panic!("expected a conflict, got {:?}", other),
    };

    let puts = blobs.puts();
    let appended = store.retry_head_update(&signer, &orphan).await.unwrap();
    assert_ne!(appended.head, orphan.list_id);
    assert_eq!(appended.pair_id, orphan.pair_id);
    assert_eq!(appended.receipt.as_ref().unwrap().nonce, 2);
    // only a new list blob, the sealed record is reused
    assert_eq!(blobs.puts(), puts + 1);
    assert_eq!(store.head(&address).await.unwrap(), appended.head);

    let records: Vec<_> = store.read_chain(&appended.head).try_collect().await.unwrap();
    let bodies: Vec<_> = records
        .iter()
        .map(|record| common::open_record(&master, &record.hybrid, &record.envelope))
        .collect();
    assert_eq!(bodies, vec![b"first".to_vec(), b"second".to_vec()]);
    assert_ne!(appended.head, first.head);

    // the stale orphan is now a no-op
    let again = store.retry_head_update(&signer, &orphan).await.unwrap();
    assert!(again.receipt.is_none());
    assert_eq!(again.head, appended.head);
    assert_eq!(store.head(&address).await.unwrap(), appended.head);
}
