//! Append-only record chains over a content-addressed blob store
//!
//! Every record is a [`PairBlob`]. The chain itself is a [`ListBlob`] of
//! pair ids, oldest first; appending stores a new pair and a new list that
//! extends the previous one, then moves the ledger head to the new list.
//! Old lists and pairs are never touched, so every earlier head stays
//! readable.

mod blobs;
mod codec;
mod error;
mod store;

pub use blobs::{
    content_id, BlobId, BlobStore, BlobStoreError, MemoryBlobStore, BLAKE3_HASH_CODE, RAW_CODEC,
};
pub use codec::{ListBlob, PairBlob};
pub use error::{ChainError, OrphanedAppend};
pub use store::{Appended, ChainConfig, ChainReader, ChainStore, DEFAULT_IO_TIMEOUT};
