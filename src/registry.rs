//! The `BatchRegistry` collaborator: notified of every newly executed batch.
//! The registry's own persistence/indexing is out of scope (`spec.md` §1);
//! only this trait boundary belongs to the engine.

use crate::store::Receipts;
use crate::types::Batch;
use async_trait::async_trait;
use std::fmt::Debug;

/// Notified once per successfully executed (genesis or default-case) batch.
/// Reorg and already-stored batches do not trigger a notification (`spec.md`
/// §4.5 steps 4–5).
#[async_trait]
pub trait BatchRegistry: Send + Sync + Debug {
    /// Called after a batch has been committed and persisted.
    async fn on_batch_executed(&self, batch: &Batch, receipts: &Receipts);
}
