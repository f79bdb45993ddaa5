use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;

use super::blobs::{BlobId, BlobStore, BlobStoreError};
use super::codec::{ListBlob, PairBlob};
use super::error::{ChainError, OrphanedAppend};
use crate::crypto::{EncryptedEnvelope, HybridCiphertext, OwnerAddress};
use crate::ledger::{
    estimate_or_fallback, FeeEstimator, FixedFee, HeadReceipt, HeadUpdate, Ledger, LedgerError,
    LedgerSigner, DEFAULT_FEE,
};

/// Default bound on a single blob store or ledger call
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Bound on every blob store, ledger and fee oracle call
    pub io_timeout: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Result of a committed append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    /// Id of the new list blob, now the ledger head
    pub head: BlobId,
    /// Id of the pair blob holding the new record
    pub pair_id: BlobId,
    /// `None` when a retried update found the ledger already pointing at `head`
    pub receipt: Option<HeadReceipt>,
}

/// Append-only, hash-linked record chains anchored in a [`Ledger`]
///
/// Blobs are always stored before the head pointer moves. Appends for the
/// same owner are serialized through a per-address lock; appends racing
/// from elsewhere are caught by the ledger as a conflict.
pub struct ChainStore<B, L> {
    blobs: Arc<B>,
    ledger: Arc<L>,
    fees: Arc<dyn FeeEstimator>,
    config: ChainConfig,
    locks: Arc<parking_lot::Mutex<HashMap<OwnerAddress, Arc<tokio::sync::Mutex<()>>>>>,
    shutdown: Option<watch::Receiver<()>>,
}

impl<B, L> Clone for ChainStore<B, L> {
    fn clone(&self) -> Self {
        Self {
            blobs: self.blobs.clone(),
            ledger: self.ledger.clone(),
            fees: self.fees.clone(),
            config: self.config.clone(),
            locks: self.locks.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<B, L> fmt::Debug for ChainStore<B, L>
where
    B: fmt::Debug,
    L: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainStore")
            .field("blobs", &self.blobs)
            .field("ledger", &self.ledger)
            .field("fees", &self.fees)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: BlobStore, L: Ledger> ChainStore<B, L> {
    pub fn new(blobs: B, ledger: L) -> Self {
        Self {
            blobs: Arc::new(blobs),
            ledger: Arc::new(ledger),
            fees: Arc::new(FixedFee::default()),
            config: ChainConfig::default(),
            locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            shutdown: None,
        }
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_fee_estimator(mut self, fees: Arc<dyn FeeEstimator>) -> Self {
        self.fees = fees;
        self
    }

    /// Abort in-flight head updates once `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Current head of `address`, empty when it has no chain
    pub async fn head(&self, address: &OwnerAddress) -> Result<String, LedgerError> {
        bounded(self.config.io_timeout, self.ledger.get_head(address))
            .await
            .unwrap_or_else(|| Err(LedgerError::Transport("get_head timed out".into())))
    }

    /// Store a record on top of `previous_head` and point the ledger at it
    ///
    /// # Errors
    ///
    /// - [`ChainError::Blob`]: storing failed, nothing changed
    /// - [`ChainError::StoreFailed`]: blobs are stored but the head update
    ///   failed; retry with [`Self::retry_head_update`]
    /// - [`ChainError::Shutdown`]: shutdown fired before anything was stored
    /// - [`ChainError::Cancelled`]: shutdown fired after the blobs were stored
    pub async fn append_record(
        &self,
        owner: &LedgerSigner,
        previous_head: &str,
        hybrid: &HybridCiphertext,
        envelope: &EncryptedEnvelope,
    ) -> Result<Appended, ChainError> {
        let lock = self.lock_for(owner.address());
        let _guard = lock.lock().await;

        if self.is_shut_down() {
            return Err(ChainError::Shutdown);
        }

        let mut list = if previous_head.is_empty() {
            ListBlob::default()
        } else {
            ListBlob::decode(&self.get_blob(&previous_head.to_string()).await?)?
        };

        let pair = PairBlob {
            hybrid: hybrid.clone(),
            envelope: envelope.clone(),
        };
        let pair_id = self.put_blob(pair.encode()).await?;
        list.push(pair_id.clone());
        let list_id = self.put_blob(list.encode()).await?;

        tracing::info!(
            address = %owner.address(),
            %pair_id,
            %list_id,
            records = list.len(),
            "stored chain record"
        );

        let orphan = OrphanedAppend {
            previous_head: previous_head.to_string(),
            pair_id,
            list_id,
        };
        self.commit(owner, orphan).await
    }

    /// Point the ledger at blobs left behind by a failed append
    ///
    /// Succeeds without a new transaction when the ledger already points at
    /// the orphaned list, or at a list that already holds the orphaned
    /// record. When the head moved on since the append, the record is
    /// appended to the current list instead; only a new list blob is stored
    /// and nothing is encrypted again.
    ///
    /// # Errors
    ///
    /// Same as [`Self::append_record`]. A returned orphan supersedes the one
    /// passed in.
    pub async fn retry_head_update(
        &self,
        owner: &LedgerSigner,
        orphan: &OrphanedAppend,
    ) -> Result<Appended, ChainError> {
        let lock = self.lock_for(owner.address());
        let _guard = lock.lock().await;

        if self.is_shut_down() {
            return Err(ChainError::Cancelled {
                orphan: orphan.clone(),
            });
        }

        // the record must still be there before we point at it
        self.get_blob(&orphan.pair_id).await?;

        let current = self.head(owner.address()).await?;
        if current == orphan.list_id {
            tracing::info!(address = %owner.address(), head = %current, "head already committed");
            return Ok(Appended {
                head: current,
                pair_id: orphan.pair_id.clone(),
                receipt: None,
            });
        }
        if current == orphan.previous_head {
            self.get_blob(&orphan.list_id).await?;
            return self.commit(owner, orphan.clone()).await;
        }

        let mut list = if current.is_empty() {
            ListBlob::default()
        } else {
            ListBlob::decode(&self.get_blob(&current).await?)?
        };
        if list.ids().contains(&orphan.pair_id) {
            tracing::info!(address = %owner.address(), head = %current, "record already committed");
            return Ok(Appended {
                head: current,
                pair_id: orphan.pair_id.clone(),
                receipt: None,
            });
        }

        list.push(orphan.pair_id.clone());
        let list_id = self.put_blob(list.encode()).await?;
        tracing::info!(
            address = %owner.address(),
            stale = %orphan.previous_head,
            %current,
            %list_id,
            "rebased orphaned record onto current head"
        );
        let rebased = OrphanedAppend {
            previous_head: current,
            pair_id: orphan.pair_id.clone(),
            list_id,
        };
        self.commit(owner, rebased).await
    }

    /// Lazily walk the chain at `head`, oldest record first
    pub fn read_chain(&self, head: &str) -> ChainReader {
        ChainReader::new(self.blobs.clone(), head.to_string(), self.config.io_timeout)
    }

    async fn commit(
        &self,
        owner: &LedgerSigner,
        orphan: OrphanedAppend,
    ) -> Result<Appended, ChainError> {
        if self.is_shut_down() {
            return Err(ChainError::Cancelled { orphan });
        }

        let fee = match bounded(self.config.io_timeout, estimate_or_fallback(&*self.fees)).await {
            Some(fee) => fee,
            None => {
                tracing::warn!(fallback = DEFAULT_FEE, "fee estimation timed out, using fallback");
                DEFAULT_FEE
            }
        };

        let update = HeadUpdate {
            address: *owner.address(),
            previous: orphan.previous_head.clone(),
            head: orphan.list_id.clone(),
            fee,
        };

        let result = tokio::select! {
            biased;
            _ = shutdown_signal(self.shutdown.clone()) => {
                tracing::warn!(list_id = %orphan.list_id, "shutdown before head update");
                return Err(ChainError::Cancelled { orphan });
            }
            result = bounded(self.config.io_timeout, self.ledger.set_head(&update, owner)) => {
                result.unwrap_or_else(|| Err(LedgerError::Transport("set_head timed out".into())))
            }
        };

        match result {
            Ok(receipt) => {
                tracing::info!(
                    address = %receipt.address,
                    head = %receipt.head,
                    nonce = receipt.nonce,
                    fee = receipt.fee,
                    "head committed"
                );
                Ok(Appended {
                    head: orphan.list_id,
                    pair_id: orphan.pair_id,
                    receipt: Some(receipt),
                })
            }
            Err(source) => {
                tracing::warn!(list_id = %orphan.list_id, error = %source, "head update failed");
                Err(ChainError::StoreFailed { orphan, source })
            }
        }
    }

    async fn put_blob(&self, data: Vec<u8>) -> Result<BlobId, ChainError> {
        let id = bounded(self.config.io_timeout, self.blobs.put(data))
            .await
            .unwrap_or_else(|| Err(BlobStoreError::Transport("put timed out".into())))?;
        Ok(id)
    }

    async fn get_blob(&self, id: &BlobId) -> Result<bytes::Bytes, ChainError> {
        let data = bounded(self.config.io_timeout, self.blobs.get(id))
            .await
            .unwrap_or_else(|| Err(BlobStoreError::Transport(format!("get {} timed out", id))))?;
        Ok(data)
    }

    fn lock_for(&self, address: &OwnerAddress) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(*address).or_default().clone()
    }

    fn is_shut_down(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| rx.has_changed().unwrap_or(false))
            .unwrap_or(false)
    }
}

/// Run `fut`, giving up after `timeout`
async fn bounded<F: Future>(timeout: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(timeout, fut).await.ok()
}

/// Resolves once a shutdown is signalled, never when there is no sender
async fn shutdown_signal(shutdown: Option<watch::Receiver<()>>) {
    match shutdown {
        Some(mut rx) => {
            if rx.changed().await.is_err() {
                futures::future::pending::<()>().await
            }
        }
        None => futures::future::pending::<()>().await,
    }
}

enum ReadState {
    Unresolved(String),
    Walking(VecDeque<BlobId>),
    Done,
}

/// Stream of the records of one chain, oldest first
///
/// Nothing is fetched until the stream is polled. The stream ends after the
/// newest record, or after the first error.
pub struct ChainReader {
    inner: BoxStream<'static, Result<PairBlob, ChainError>>,
}

impl ChainReader {
    fn new<B: BlobStore>(blobs: Arc<B>, head: String, io_timeout: Duration) -> Self {
        let initial = if head.is_empty() {
            ReadState::Done
        } else {
            ReadState::Unresolved(head)
        };
        let inner = stream::unfold(initial, move |state| {
            let blobs = blobs.clone();
            async move { next_record(blobs, state, io_timeout).await }
        })
        .boxed();
        Self { inner }
    }
}

impl Stream for ChainReader {
    type Item = Result<PairBlob, ChainError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for ChainReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainReader").finish_non_exhaustive()
    }
}

async fn next_record<B: BlobStore>(
    blobs: Arc<B>,
    state: ReadState,
    io_timeout: Duration,
) -> Option<(Result<PairBlob, ChainError>, ReadState)> {
    let fetch = |id: BlobId| {
        let blobs = blobs.clone();
        async move {
            bounded(io_timeout, blobs.get(&id))
                .await
                .unwrap_or_else(|| Err(BlobStoreError::Transport(format!("get {} timed out", id))))
                .map_err(ChainError::from)
        }
    };

    let mut ids = match state {
        ReadState::Done => return None,
        ReadState::Walking(ids) => ids,
        ReadState::Unresolved(head) => {
            let list = match fetch(head).await.and_then(|data| ListBlob::decode(&data)) {
                Ok(list) => list,
                Err(e) => return Some((Err(e), ReadState::Done)),
            };
            tracing::debug!(records = list.len(), "resolved chain head");
            VecDeque::from(list.0)
        }
    };

    let id = ids.pop_front()?;
    let record = fetch(id).await.and_then(|data| PairBlob::decode(&data));
    match record {
        Ok(pair) => Some((Ok(pair), ReadState::Walking(ids))),
        Err(e) => Some((Err(e), ReadState::Done)),
    }
}
