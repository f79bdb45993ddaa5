use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tempfile::NamedTempFile;

use super::memory::{apply_update, HeadEntry};
use super::provider::{HeadReceipt, HeadUpdate, Ledger, LedgerError};
use super::signer::LedgerSigner;
use crate::crypto::OwnerAddress;

type Entries = HashMap<OwnerAddress, HeadEntry>;

/// Ledger persisted as a JSON map of address to head entry
///
/// Every update holds an exclusive lock on a sibling `.lock` file for the
/// whole read, check and write, so separate processes sharing the file see
/// each other's heads and a stale update is rejected as a conflict. The file
/// is rewritten through a uniquely named temporary file and a rename, so a
/// crash never leaves a half written ledger behind.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on a blocking thread while holding the ledger lock
    async fn locked<T, F>(&self, exclusive: bool, f: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, LedgerError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let _lock = acquire(&path, exclusive)
                .map_err(|e| io_error("failed to lock ledger file", &path, e))?;
            f(&path)
        })
        .await
        .map_err(|e| LedgerError::Transport(format!("ledger task failed: {}", e)))?
    }
}

fn io_error(action: &str, path: &Path, e: io::Error) -> LedgerError {
    LedgerError::Transport(format!("{} {}: {}", action, path.display(), e))
}

/// Directory holding the ledger file, `.` for a bare file name
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Lock the sibling lock file, released when the returned handle drops
fn acquire(path: &Path, exclusive: bool) -> io::Result<File> {
    fs::create_dir_all(parent_dir(path))?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))?;
    if exclusive {
        FileExt::lock_exclusive(&file)?;
    } else {
        FileExt::lock_shared(&file)?;
    }
    Ok(file)
}

fn load(path: &Path) -> Result<Entries, LedgerError> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            LedgerError::Transport(format!("ledger file {} is corrupt: {}", path.display(), e))
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(io_error("failed to read ledger file", path, e)),
    }
}

fn store(path: &Path, entries: &Entries) -> Result<(), LedgerError> {
    let json = serde_json::to_vec_pretty(entries)
        .map_err(|e| LedgerError::Transport(format!("failed to encode ledger: {}", e)))?;
    let write = |e: io::Error| io_error("failed to write ledger file", path, e);

    let mut tmp = NamedTempFile::new_in(parent_dir(path)).map_err(write)?;
    tmp.write_all(&json).map_err(write)?;
    tmp.as_file().sync_all().map_err(write)?;
    tmp.persist(path).map_err(|e| write(e.error))?;
    Ok(())
}

#[async_trait]
impl Ledger for FileLedger {
    async fn get_head(&self, address: &OwnerAddress) -> Result<String, LedgerError> {
        let address = *address;
        self.locked(false, move |path| {
            Ok(load(path)?
                .get(&address)
                .map(|entry| entry.head.clone())
                .unwrap_or_default())
        })
        .await
    }

    async fn set_head(
        &self,
        update: &HeadUpdate,
        signer: &LedgerSigner,
    ) -> Result<HeadReceipt, LedgerError> {
        let (update, signer) = (update.clone(), signer.clone());
        let receipt = self
            .locked(true, move |path| {
                let mut entries = load(path)?;
                let receipt = apply_update(&mut entries, &update, &signer)?;
                store(path, &entries)?;
                Ok(receipt)
            })
            .await?;
        tracing::info!(
            address = %receipt.address,
            head = %receipt.head,
            nonce = receipt.nonce,
            path = %self.path.display(),
            "head updated"
        );
        Ok(receipt)
    }
}
