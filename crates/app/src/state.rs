use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::chain::{ChainConfig, OrphanedAppend, DEFAULT_IO_TIMEOUT};
use common::crypto::{
    open_root_key, seal_root_key, DerivationPolicy, EncryptedEnvelope, ExtendedKey, OwnerAddress,
    Secret, VaultError,
};
use common::ledger::{FeeError, FeeEstimator, FileLedger, FixedFee, HttpFeeEstimator};
use common::session::{DappIdentifierMode, Session, SessionConfig};
use object_store::{ObjectBlobStore, ObjectStoreConfig, ObjectStoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;
use zeroize::Zeroizing;

pub const APP_NAME: &str = "sealchain";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const ROOT_KEY_FILE_NAME: &str = "root.key";
pub const VAULT_SECRET_FILE_NAME: &str = "vault.secret";
pub const LEDGER_FILE_NAME: &str = "ledger.json";
pub const PENDING_FILE_NAME: &str = "pending.json";
pub const BLOBS_DIR_NAME: &str = "blobs";
pub const LOGS_DIR_NAME: &str = "logs";

/// Seed length used when no seed is imported
pub const GENERATED_SEED_SIZE: usize = 32;

/// The session handle the CLI works with
pub type AppSession = Session<ObjectBlobStore, FileLedger>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where sealed records are stored
    #[serde(default = "default_blob_store")]
    pub blob_store: ObjectStoreConfig,
    /// Ledger file, relative paths resolve against the state directory
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Gas oracle queried for head update fees,
    ///  a fixed default fee is used if not set
    #[serde(default)]
    pub fee_oracle_url: Option<Url>,
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    #[serde(default)]
    pub dapp_identifier_mode: DappIdentifierMode,
    #[serde(default)]
    pub derivation_policy: DerivationPolicy,
}

fn default_blob_store() -> ObjectStoreConfig {
    ObjectStoreConfig::Local {
        path: PathBuf::from(BLOBS_DIR_NAME),
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(LEDGER_FILE_NAME)
}

fn default_io_timeout_secs() -> u64 {
    DEFAULT_IO_TIMEOUT.as_secs()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            blob_store: default_blob_store(),
            ledger_path: default_ledger_path(),
            fee_oracle_url: None,
            io_timeout_secs: default_io_timeout_secs(),
            dapp_identifier_mode: DappIdentifierMode::default(),
            derivation_policy: DerivationPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            dapp_identifier_mode: self.dapp_identifier_mode,
            derivation_policy: self.derivation_policy,
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            io_timeout: Duration::from_secs(self.io_timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the state directory (~/.sealchain)
    pub dir: PathBuf,
    /// Master key sealed under the vault secret
    pub root_key_path: PathBuf,
    /// Local secret that opens the root key
    pub vault_secret_path: PathBuf,
    /// Head update left behind by an interrupted session request
    pub pending_path: PathBuf,
    pub logs_path: PathBuf,
    pub config_path: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    /// Get the state directory path (custom or default ~/.sealchain)
    pub fn state_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn at(dir: PathBuf, config: AppConfig) -> Self {
        Self {
            root_key_path: dir.join(ROOT_KEY_FILE_NAME),
            vault_secret_path: dir.join(VAULT_SECRET_FILE_NAME),
            pending_path: dir.join(PENDING_FILE_NAME),
            logs_path: dir.join(LOGS_DIR_NAME),
            config_path: dir.join(CONFIG_FILE_NAME),
            dir,
            config,
        }
    }

    /// Initialize a new state directory holding a sealed master key
    ///
    /// The master key is derived from `seed`, or from fresh randomness if
    /// no seed is given.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
        seed: Option<&[u8]>,
    ) -> Result<Self, StateError> {
        let dir = Self::state_dir(custom_path)?;
        if dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        let master = match seed {
            Some(seed) => ExtendedKey::from_seed(seed),
            None => {
                let mut seed = Zeroizing::new([0u8; GENERATED_SEED_SIZE]);
                getrandom::getrandom(seed.as_mut())
                    .map_err(|e| StateError::InvalidKey(e.to_string()))?;
                ExtendedKey::from_seed(seed.as_ref())
            }
        }
        .map_err(|e| StateError::InvalidKey(e.to_string()))?;

        let vault_secret = Secret::generate().map_err(VaultError::from)?;
        let sealed = seal_root_key(&vault_secret, &master)?;

        let state = Self::at(dir, config.unwrap_or_default());
        fs::create_dir_all(&state.dir)?;
        fs::create_dir_all(&state.logs_path)?;
        if let ObjectStoreConfig::Local { path } = &state.config.blob_store {
            fs::create_dir_all(state.resolve(path))?;
        }

        fs::write(&state.vault_secret_path, vault_secret.to_hex().as_bytes())?;
        fs::write(&state.root_key_path, sealed.to_hex())?;
        fs::write(&state.config_path, toml::to_string_pretty(&state.config)?)?;

        tracing::info!(dir = %state.dir.display(), address = %master.owner_address(), "initialized state directory");
        Ok(state)
    }

    /// Load existing state from the state directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let dir = Self::state_dir(custom_path)?;
        if !dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        for (path, name) in [
            (&config_path, CONFIG_FILE_NAME),
            (&dir.join(ROOT_KEY_FILE_NAME), ROOT_KEY_FILE_NAME),
            (&dir.join(VAULT_SECRET_FILE_NAME), VAULT_SECRET_FILE_NAME),
        ] {
            if !path.exists() {
                return Err(StateError::MissingFile(name.to_string()));
            }
        }

        let config: AppConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;
        Ok(Self::at(dir, config))
    }

    /// Resolve a configured path against the state directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    /// Open the sealed master key
    pub fn load_master(&self) -> Result<ExtendedKey, StateError> {
        let secret_hex = Zeroizing::new(fs::read_to_string(&self.vault_secret_path)?);
        let secret = Secret::from_hex(secret_hex.trim())
            .map_err(|e| StateError::InvalidKey(e.to_string()))?;
        let sealed = EncryptedEnvelope::from_hex(fs::read_to_string(&self.root_key_path)?.trim())
            .map_err(|e| StateError::InvalidKey(e.to_string()))?;
        Ok(open_root_key(&secret, &sealed)?)
    }

    pub fn owner_address(&self) -> Result<OwnerAddress, StateError> {
        Ok(self.load_master()?.owner_address())
    }

    fn blob_store_config(&self) -> ObjectStoreConfig {
        match &self.config.blob_store {
            ObjectStoreConfig::Local { path } => ObjectStoreConfig::Local {
                path: self.resolve(path),
            },
            other => other.clone(),
        }
    }

    fn fee_estimator(&self) -> Result<Arc<dyn FeeEstimator>, StateError> {
        Ok(match &self.config.fee_oracle_url {
            Some(url) => Arc::new(HttpFeeEstimator::new(
                url.clone(),
                Duration::from_secs(self.config.io_timeout_secs),
            )?),
            None => Arc::new(FixedFee::default()),
        })
    }

    /// Build a session with the master key loaded
    pub async fn session(
        &self,
        shutdown: Option<watch::Receiver<()>>,
    ) -> Result<AppSession, StateError> {
        let blobs = ObjectBlobStore::new(self.blob_store_config()).await?;
        let ledger = FileLedger::new(self.resolve(&self.config.ledger_path));

        let mut builder = Session::builder(blobs, ledger)
            .master_key(self.load_master()?)
            .config(self.config.session_config())
            .chain_config(self.config.chain_config())
            .fee_estimator(self.fee_estimator()?);
        if let Some(shutdown) = shutdown {
            builder = builder.shutdown(shutdown);
        }
        Ok(builder.build())
    }

    /// Remember an append whose head update never landed
    pub fn save_pending(&self, orphan: &OrphanedAppend) -> Result<(), StateError> {
        fs::write(&self.pending_path, serde_json::to_vec_pretty(orphan)?)?;
        Ok(())
    }

    pub fn load_pending(&self) -> Result<Option<OrphanedAppend>, StateError> {
        if !self.pending_path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(&self.pending_path)?)?))
    }

    pub fn clear_pending(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.pending_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("sealchain directory not initialized. Run 'sealchain init' first")]
    NotInitialized,

    #[error("sealchain directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("blob store error: {0}")]
    BlobStore(#[from] ObjectStoreError),

    #[error("fee oracle error: {0}")]
    Fee(#[from] FeeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
