//! The `Store` collaborator: a key-value map over hashes and sequence
//! numbers. The storage backend's implementation is out of scope
//! (`spec.md` §1); only this trait boundary belongs to the engine.

use crate::types::{Batch, L1Block};
use alloy_primitives::B256;
use async_trait::async_trait;
use std::fmt::Debug;

/// A batch and receipts pair, as persisted by [`Store::store_executed_batch`].
///
/// Receipts themselves are opaque to the engine (the executor's internals
/// are out of scope); this crate only needs to pass them through.
pub type Receipts = Vec<Vec<u8>>;

/// The storage backend the engine reads from and writes to.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Fetches an L1 block by hash.
    async fn fetch_block(&self, hash: B256) -> Option<L1Block>;
    /// Fetches a batch by its header hash.
    async fn fetch_batch(&self, hash: B256) -> Option<Batch>;
    /// Fetches a batch by sequence number.
    async fn fetch_batch_by_seq(&self, seq: u64) -> Option<Batch>;
    /// Returns `true` if a batch with this sequence number is already stored
    /// and is canonical (used to implement the idempotent "already stored"
    /// skip path, `spec.md` §4.5 step 4).
    async fn is_stored_canonical(&self, seq: u64) -> bool;
    /// Returns every non-canonical batch with seq in `[lo, hi]`, inclusive.
    async fn fetch_non_canonical_batches_between(&self, lo: u64, hi: u64) -> Vec<Batch>;
    /// Persists a batch verbatim (used for reorg exceptions).
    async fn store_batch(&self, batch: Batch, canonical: bool);
    /// Persists a freshly executed batch together with its receipts.
    async fn store_executed_batch(&self, batch: Batch, receipts: Receipts);
}
