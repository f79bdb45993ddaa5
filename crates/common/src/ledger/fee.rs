//! Best-effort fee estimation for head updates
//!
//! A failed estimate never blocks an update: [`estimate_or_fallback`] logs
//! the failure and returns [`DEFAULT_FEE`].

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Fee used when the estimator fails
pub const DEFAULT_FEE: u64 = 40_000;

/// Public gas oracle queried by default
pub const DEFAULT_FEE_ORACLE_URL: &str = "https://sepolia.beaconcha.in/api/v1/execution/gasnow";

#[derive(Debug, thiserror::Error)]
pub enum FeeError {
    #[error("fee oracle request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("fee oracle answered with status {0}")]
    Status(u16),
    #[error("fee oracle response has no usable data.rapid field: {0}")]
    Response(String),
}

#[async_trait]
pub trait FeeEstimator: Send + Sync + Debug + 'static {
    async fn estimate(&self) -> Result<u64, FeeError>;
}

/// Always answers with the same fee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFee(pub u64);

impl Default for FixedFee {
    fn default() -> Self {
        FixedFee(DEFAULT_FEE)
    }
}

#[async_trait]
impl FeeEstimator for FixedFee {
    async fn estimate(&self) -> Result<u64, FeeError> {
        Ok(self.0)
    }
}

/// Reads the `data.rapid` field of a gasnow-style JSON oracle
#[derive(Debug, Clone)]
pub struct HttpFeeEstimator {
    client: reqwest::Client,
    url: Url,
}

impl HttpFeeEstimator {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FeeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl FeeEstimator for HttpFeeEstimator {
    async fn estimate(&self) -> Result<u64, FeeError> {
        let response = self
            .client
            .get(self.url.clone())
            .header("accept", "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FeeError::Status(response.status().as_u16()));
        }
        let body: Value = response.json().await?;
        parse_rapid(&body)
    }
}

fn parse_rapid(body: &Value) -> Result<u64, FeeError> {
    let rapid = body
        .get("data")
        .and_then(|data| data.get("rapid"))
        .ok_or_else(|| FeeError::Response(body.to_string()))?;
    let fee = match rapid {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    fee.ok_or_else(|| FeeError::Response(rapid.to_string()))
}

/// Estimate a fee, falling back to [`DEFAULT_FEE`] on any failure
pub async fn estimate_or_fallback(estimator: &dyn FeeEstimator) -> u64 {
    match estimator.estimate().await {
        Ok(fee) => {
            tracing::debug!(fee, "estimated fee");
            fee
        }
        Err(e) => {
            tracing::warn!(error = %e, fallback = DEFAULT_FEE, "fee estimation failed, using fallback");
            DEFAULT_FEE
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rapid() {
        assert_eq!(
            parse_rapid(&json!({"code": 200, "data": {"rapid": 1500000000u64, "fast": 1}}))
                .unwrap(),
            1_500_000_000
        );
        assert_eq!(parse_rapid(&json!({"data": {"rapid": "42"}})).unwrap(), 42);
        assert!(parse_rapid(&json!({"data": {}})).is_err());
        assert!(parse_rapid(&json!({"data": {"rapid": null}})).is_err());
        assert!(parse_rapid(&json!({"data": {"rapid": -3}})).is_err());
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl FeeEstimator for Broken {
        async fn estimate(&self) -> Result<u64, FeeError> {
            Err(FeeError::Status(503))
        }
    }

    #[tokio::test]
    async fn test_fallback_on_failure() {
        assert_eq!(estimate_or_fallback(&Broken).await, DEFAULT_FEE);
        assert_eq!(estimate_or_fallback(&FixedFee(7)).await, 7);
    }
}
