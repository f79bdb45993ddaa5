/**
 * Hash-linked record chains over a content-addressed
 *  blob store. Pair and list blob codecs, the chain
 *  store and its lazy reader.
 */
pub mod chain;
/**
 * Cryptographic types and operations.
 *  - Hierarchical key derivation over secp256k1
 *  - Symmetric and hybrid sealing of credentials
 *  - Local sealing of the master key
 */
pub mod crypto;
/**
 * The external ledger holding one head pointer
 *  per identity, with signing and fee estimation.
 */
pub mod ledger;
/**
 * Orchestration of a per-application credential:
 *  derive, seal, store, and read back.
 */
pub mod session;

pub mod prelude {
    pub use crate::chain::{BlobStore, ChainError, ChainStore, MemoryBlobStore};
    pub use crate::crypto::{ExtendedKey, OwnerAddress, Secret};
    pub use crate::ledger::{Ledger, LedgerSigner, MemoryLedger};
    pub use crate::session::{Session, SessionConfig, SessionError, SessionIdentity};
}
