use std::sync::Arc;

use futures::StreamExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use zeroize::Zeroizing;

use super::state::{SessionPhase, SessionState};
use crate::chain::{
    Appended, BlobId, BlobStore, ChainConfig, ChainError, ChainStore, OrphanedAppend,
};
use crate::crypto::{
    decrypt_with_private_key, encrypt_for_recipient, CipherError, CredentialPayload,
    DerivationPolicy, ExtendedKey, KeyTreeError, OwnerAddress, Payload, Secret, HARDENED_BIT,
    PUBLIC_KEY_SIZE,
};
use crate::ledger::{FeeEstimator, HeadReceipt, Ledger, LedgerError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no master key loaded")]
    NotInitialized,
    #[error("key derivation failed: {0}")]
    KeyTree(#[from] KeyTreeError),
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// How the application identifier is computed from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DappIdentifierMode {
    /// `SHA-256(origin)`: the same origin always maps to the same child key
    #[default]
    Origin,
    /// `SHA-256` of a freshly generated random URL, ignoring the origin
    RandomPlaceholder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub dapp_identifier_mode: DappIdentifierMode,
    #[serde(default)]
    pub derivation_policy: DerivationPolicy,
}

/// Public result of a bootstrap, safe to hand to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub dapp_origin: String,
    pub dapp_identifier: [u8; 32],
    /// Index the child was derived at; differs from the requested one only
    /// when the derivation policy had to skip an invalid index
    pub child_index: u32,
    /// `serP` of the child public key
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    /// New chain head holding the sealed credential
    pub head: BlobId,
    pub receipt: Option<HeadReceipt>,
}

/// A credential recovered from the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedCredential {
    /// Position in the chain, 0 is the oldest
    pub position: usize,
    pub credential: CredentialPayload,
}

/// Builds a [`Session`] over a blob store and a ledger
pub struct SessionBuilder<B: BlobStore, L: Ledger> {
    blobs: B,
    ledger: L,
    master: Option<ExtendedKey>,
    config: SessionConfig,
    chain_config: ChainConfig,
    fees: Option<Arc<dyn FeeEstimator>>,
    shutdown: Option<watch::Receiver<()>>,
}

impl<B: BlobStore, L: Ledger> SessionBuilder<B, L> {
    pub fn new(blobs: B, ledger: L) -> Self {
        SessionBuilder {
            blobs,
            ledger,
            master: None,
            config: SessionConfig::default(),
            chain_config: ChainConfig::default(),
            fees: None,
            shutdown: None,
        }
    }

    pub fn master_key(mut self, master: ExtendedKey) -> Self {
        self.master = Some(master);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn chain_config(mut self, chain_config: ChainConfig) -> Self {
        self.chain_config = chain_config;
        self
    }

    pub fn fee_estimator(mut self, fees: Arc<dyn FeeEstimator>) -> Self {
        self.fees = Some(fees);
        self
    }

    pub fn shutdown(mut self, shutdown: watch::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn build(self) -> Session<B, L> {
        let mut chain = ChainStore::new(self.blobs, self.ledger).with_config(self.chain_config);
        if let Some(fees) = self.fees {
            chain = chain.with_fee_estimator(fees);
        }
        if let Some(shutdown) = self.shutdown {
            chain = chain.with_shutdown(shutdown);
        }

        let mut state = SessionState::new();
        if let Some(master) = self.master {
            state.load(master);
        }

        Session {
            state,
            chain,
            config: self.config,
        }
    }
}

/// Handle owning the resident master key of one identity
///
/// Bootstraps take `&mut self`, so one handle runs at most one bootstrap at
/// a time.
#[derive(Debug)]
pub struct Session<B: BlobStore, L: Ledger> {
    state: SessionState,
    chain: ChainStore<B, L>,
    config: SessionConfig,
}

impl<B: BlobStore, L: Ledger> Session<B, L> {
    pub fn builder(blobs: B, ledger: L) -> SessionBuilder<B, L> {
        SessionBuilder::new(blobs, ledger)
    }

    pub fn load_master(&mut self, master: ExtendedKey) {
        let address = master.owner_address();
        self.state.load(master);
        tracing::info!(%address, "master key loaded");
    }

    /// Wipe the resident master key
    pub fn logout(&mut self) {
        self.state.clear();
        tracing::info!("master key cleared");
    }

    pub fn state(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn owner_address(&self) -> Result<OwnerAddress, SessionError> {
        self.state.owner_address()
    }

    pub fn chain(&self) -> &ChainStore<B, L> {
        &self.chain
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Derive, seal and store a new credential for `dapp_origin`
    ///
    /// On failure the session returns to [`SessionPhase::MasterKeyLoaded`];
    /// the only externally visible effect can be orphaned blobs, reported
    /// through [`ChainError::StoreFailed`] or [`ChainError::Cancelled`].
    pub async fn request_new_session(
        &mut self,
        dapp_origin: &str,
    ) -> Result<SessionIdentity, SessionError> {
        self.state.master()?;

        let result = self.bootstrap(dapp_origin).await;
        match &result {
            Ok(identity) => {
                self.state.advance(SessionPhase::Stored);
                tracing::info!(
                    origin = dapp_origin,
                    child_index = identity.child_index,
                    head = %identity.head,
                    "session credential stored"
                );
            }
            Err(e) => {
                self.state.advance(SessionPhase::MasterKeyLoaded);
                tracing::warn!(origin = dapp_origin, error = %e, "session bootstrap failed");
            }
        }
        result
    }

    async fn bootstrap(&mut self, dapp_origin: &str) -> Result<SessionIdentity, SessionError> {
        let dapp_identifier = self.dapp_identifier(dapp_origin);
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&dapp_identifier[..4]);
        let requested_index = HARDENED_BIT | u32::from_be_bytes(prefix);

        let (child, child_index) = self
            .state
            .master()?
            .derive_child_with_policy(requested_index, self.config.derivation_policy)?;
        self.state.advance(SessionPhase::ChildDerived);

        let (hybrid, envelope, public_key) = {
            let session_key = Secret::generate()?;
            let master_public = self.state.master()?.public_key_bytes();
            let hybrid = encrypt_for_recipient(&master_public, session_key.bytes())?;
            let payload = Payload::Credential(CredentialPayload::from_key(&child, &dapp_identifier));
            let envelope = session_key.encrypt(&payload)?;
            (hybrid, envelope, child.public_key_bytes())
        };
        // child key material is not needed past this point
        drop(child);
        self.state.advance(SessionPhase::PayloadSealed);

        let signer = self.state.signer()?;
        let head = self.chain.head(signer.address()).await?;
        let appended = self
            .chain
            .append_record(signer, &head, &hybrid, &envelope)
            .await?;

        Ok(SessionIdentity {
            dapp_origin: dapp_origin.to_string(),
            dapp_identifier,
            child_index,
            public_key,
            head: appended.head,
            receipt: appended.receipt,
        })
    }

    /// Open every credential on this identity's chain, oldest first
    pub async fn read_credentials(&self) -> Result<Vec<OpenedCredential>, SessionError> {
        let master = self.state.master()?;
        let head = self.chain.head(&master.owner_address()).await?;

        let mut records = self.chain.read_chain(&head);
        let mut opened = Vec::new();
        while let Some(pair) = records.next().await {
            let pair = pair?;
            let session_key = Zeroizing::new(decrypt_with_private_key(
                master.secret_key(),
                &pair.hybrid,
            )?);
            let credential = Secret::from_slice(&session_key)?.open_credential(&pair.envelope)?;
            opened.push(OpenedCredential {
                position: opened.len(),
                credential,
            });
        }
        tracing::debug!(records = opened.len(), %head, "read credentials");
        Ok(opened)
    }

    /// Commit blobs left behind by a failed [`Session::request_new_session`]
    pub async fn retry_head_update(
        &mut self,
        orphan: &OrphanedAppend,
    ) -> Result<Appended, SessionError> {
        let signer = self.state.signer()?;
        let appended = self.chain.retry_head_update(signer, orphan).await?;
        self.state.advance(SessionPhase::Stored);
        Ok(appended)
    }

    fn dapp_identifier(&self, dapp_origin: &str) -> [u8; 32] {
        match self.config.dapp_identifier_mode {
            DappIdentifierMode::Origin => Sha256::digest(dapp_origin.as_bytes()).into(),
            DappIdentifierMode::RandomPlaceholder => {
                let placeholder = random_placeholder_url();
                tracing::debug!(origin = dapp_origin, %placeholder, "using placeholder identifier");
                Sha256::digest(placeholder.as_bytes()).into()
            }
        }
    }
}

/// A random `protocol://name.tld` URL
pub fn random_placeholder_url() -> String {
    const PROTOCOLS: [&str; 2] = ["http", "https"];
    const DOMAINS: [&str; 6] = ["es", "com", "org", "net", "info", "biz"];
    const CHARACTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    let mut rng = rand::rng();
    let name_len = rng.random_range(5..=15);
    let name: String = (0..name_len)
        .map(|_| CHARACTERS[rng.random_range(0..CHARACTERS.len())] as char)
        .collect();
    format!(
        "{}://{}.{}",
        PROTOCOLS[rng.random_range(0..PROTOCOLS.len())],
        name,
        DOMAINS[rng.random_range(0..DOMAINS.len())]
    )
}
