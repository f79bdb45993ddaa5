//! The external ledger anchoring one head pointer per identity
//!
//! A [`Ledger`] maps an [`OwnerAddress`](crate::crypto::OwnerAddress) to the
//! id of the newest list blob of that identity's chain. Updates are signed by
//! the master key through a [`LedgerSigner`] and carry a fee from a
//! [`FeeEstimator`].

mod fee;
mod file;
mod memory;
mod provider;
mod signer;

pub use fee::{
    estimate_or_fallback, FeeError, FeeEstimator, FixedFee, HttpFeeEstimator, DEFAULT_FEE,
    DEFAULT_FEE_ORACLE_URL,
};
pub use file::FileLedger;
pub use memory::{HeadEntry, MemoryLedger};
pub use provider::{HeadReceipt, HeadUpdate, Ledger, LedgerError};
pub use signer::{recover_signer, LedgerSigner, SIGNATURE_SIZE};
