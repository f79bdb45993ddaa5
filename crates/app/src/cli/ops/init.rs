use std::path::PathBuf;

use clap::Args;
use url::Url;
use zeroize::Zeroizing;

use common::crypto::DerivationPolicy;
use common::session::DappIdentifierMode;
use object_store::ObjectStoreConfig;
use sealchain::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Hex seed to import the master key from (a random seed is used if not set)
    #[arg(long)]
    pub seed: Option<String>,

    /// Directory for sealed records (defaults to <state dir>/blobs)
    #[arg(long)]
    pub blobs_path: Option<PathBuf>,

    /// Gas oracle answering with a `data.rapid` fee (a fixed fee is used if not set)
    #[arg(long)]
    pub fee_oracle: Option<Url>,

    /// Bound on every storage, ledger and oracle call, in seconds
    #[arg(long, default_value_t = 30)]
    pub io_timeout_secs: u64,

    /// Derive session keys from a random placeholder URL instead of the origin
    #[arg(long)]
    pub placeholder_identifiers: bool,

    /// Fail instead of moving to the next index on an invalid child key
    #[arg(long)]
    pub strict_derivation: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] sealchain::StateError),
    #[error("seed is not valid hex: {0}")]
    InvalidSeed(#[from] hex::FromHexError),
}

impl Init {
    fn config(&self) -> AppConfig {
        let defaults = AppConfig::default();
        let blob_store = match &self.blobs_path {
            Some(path) => ObjectStoreConfig::Local { path: path.clone() },
            None => defaults.blob_store.clone(),
        };

        AppConfig {
            blob_store,
            fee_oracle_url: self.fee_oracle.clone(),
            io_timeout_secs: self.io_timeout_secs,
            dapp_identifier_mode: if self.placeholder_identifiers {
                DappIdentifierMode::RandomPlaceholder
            } else {
                DappIdentifierMode::Origin
            },
            derivation_policy: if self.strict_derivation {
                DerivationPolicy::Strict
            } else {
                DerivationPolicy::NextIndex
            },
            ..defaults
        }
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let seed = self
            .seed
            .as_deref()
            .map(|seed| hex::decode(seed.trim_start_matches("0x")).map(Zeroizing::new))
            .transpose()?;

        let state = AppState::init(
            ctx.config_path.clone(),
            Some(self.config()),
            seed.as_ref().map(|seed| seed.as_slice()),
        )?;
        let address = state.owner_address()?;

        let blobs = match &state.config.blob_store {
            ObjectStoreConfig::Memory => "memory".to_string(),
            ObjectStoreConfig::Local { path } => state.resolve(path).display().to_string(),
            ObjectStoreConfig::S3 {
                endpoint, bucket, ..
            } => format!("s3 {}/{}", endpoint, bucket),
        };
        let fees = match &state.config.fee_oracle_url {
            Some(url) => url.to_string(),
            None => "fixed".to_string(),
        };

        Ok(format!(
            "Initialized sealchain directory at: {}\n\
             - Address: {}\n\
             - Root key: {}\n\
             - Blobs: {}\n\
             - Ledger: {}\n\
             - Fees: {}\n\
             - Config: {}",
            state.dir.display(),
            address,
            state.root_key_path.display(),
            blobs,
            state.resolve(&state.config.ledger_path).display(),
            fees,
            state.config_path.display(),
        ))
    }
}
