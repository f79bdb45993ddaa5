//! Fee oracle tests against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;

use ::common::chain::{ChainStore, MemoryBlobStore};
use ::common::crypto::{encrypt_for_recipient, ExtendedKey, Payload, Secret};
use ::common::ledger::{
    estimate_or_fallback, FeeError, FeeEstimator, HttpFeeEstimator, LedgerSigner, MemoryLedger,
    DEFAULT_FEE,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn estimator_for(server: &MockServer) -> HttpFeeEstimator {
    let url = Url::parse(&format!("{}/api/v1/execution/gasnow", server.uri())).unwrap();
    HttpFeeEstimator::new(url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_reads_rapid_fee() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/execution/gasnow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {"rapid": 2_000_000_000u64, "fast": 1_500_000_000u64, "standard": 1}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let estimator = estimator_for(&server).await;
    assert_eq!(estimator.estimate().await.unwrap(), 2_000_000_000);
    assert_eq!(estimate_or_fallback(&estimator).await, 2_000_000_000);
}

#[tokio::test]
async fn test_server_error_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let estimator = estimator_for(&server).await;
    assert!(matches!(estimator.estimate().await, Err(FeeError::Status(500))));
    assert_eq!(estimate_or_fallback(&estimator).await, DEFAULT_FEE);
}

#[tokio::test]
async fn test_malformed_body_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"slow": 1}})))
        .mount(&server)
        .await;

    let estimator = estimator_for(&server).await;
    assert!(matches!(estimator.estimate().await, Err(FeeError::Response(_))));
    assert_eq!(estimate_or_fallback(&estimator).await, DEFAULT_FEE);

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    assert!(matches!(estimator.estimate().await, Err(FeeError::Request(_))));
    assert_eq!(estimate_or_fallback(&estimator).await, DEFAULT_FEE);
}

#[tokio::test]
async fn test_unreachable_oracle_does_not_block_append() {
    let server = MockServer::start().await;
    let estimator = estimator_for(&server).await;
    // nothing listens here anymore
    drop(server);

    let master = ExtendedKey::from_seed(&[9u8; 32]).unwrap();
    let signer = LedgerSigner::from_key(&master);
    let store = ChainStore::new(MemoryBlobStore::default(), MemoryLedger::default())
        .with_fee_estimator(Arc::new(estimator));

    let secret = Secret::generate().unwrap();
    let hybrid = encrypt_for_recipient(&master.public_key_bytes(), secret.bytes()).unwrap();
    let envelope = secret.encrypt(&Payload::Raw(b"record".to_vec())).unwrap();

    let appended = store
        .append_record(&signer, "", &hybrid, &envelope)
        .await
        .unwrap();
    assert_eq!(appended.receipt.unwrap().fee, DEFAULT_FEE);
}
