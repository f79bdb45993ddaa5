//! Sessions opened from an initialized state directory

use sealchain::state::{AppConfig, AppState};
use common::crypto::ExtendedKey;

const SEED: [u8; 32] = [0x42; 32];

#[tokio::test]
async fn test_sessions_persist_across_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("state");
    AppState::init(Some(dir.clone()), None, Some(&SEED)).unwrap();

    let state = AppState::load(Some(dir.clone())).unwrap();
    let mut session = state.session(None).await.unwrap();
    let first = session
        .request_new_session("https://one.example")
        .await
        .unwrap();
    session
        .request_new_session("https://two.example")
        .await
        .unwrap();
    drop(session);

    // a fresh process sees both records through the ledger file
    let state = AppState::load(Some(dir)).unwrap();
    let session = state.session(None).await.unwrap();
    let opened = session.read_credentials().await.unwrap();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].credential.session_public_key, first.public_key.to_vec());
    assert_eq!(
        session.owner_address().unwrap(),
        ExtendedKey::from_seed(&SEED).unwrap().owner_address()
    );
}

#[tokio::test]
async fn test_absolute_blob_path_is_respected() {
    let temp = tempfile::tempdir().unwrap();
    let blobs = temp.path().join("elsewhere");
    let config = AppConfig {
        blob_store: object_store::ObjectStoreConfig::Local {
            path: blobs.clone(),
        },
        ..AppConfig::default()
    };
    let state = AppState::init(Some(temp.path().join("state")), Some(config), Some(&SEED)).unwrap();

    let mut session = state.session(None).await.unwrap();
    session
        .request_new_session("https://one.example")
        .await
        .unwrap();
    assert!(blobs.join("blobs").read_dir().unwrap().count() >= 2);
}
