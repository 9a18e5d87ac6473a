//! The `BatchExecutor` collaborator: a pure `execute(ctx) -> (header,
//! receipts)` function. EVM state-transition internals are out of scope
//! (`spec.md` §1); only this trait boundary belongs to the engine.

use crate::store::Receipts;
use crate::types::Batch;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::fmt::Debug;

/// Inputs needed to compute a non-genesis batch, per `spec.md` §4.5 step 5.
#[derive(Debug, Clone)]
pub struct BatchComputeCtx {
    /// Sequence number of the batch being computed.
    pub seq: u64,
    /// Height this batch will occupy once committed.
    pub height: u64,
    /// L1 proof hash this batch commits to.
    pub l1_proof: B256,
    /// Parent hash of the preceding canonical batch.
    pub parent_hash: B256,
    /// Ordered transaction list.
    pub transactions: Vec<Vec<u8>>,
    /// Wall time.
    pub time: u64,
    /// Coinbase shared across the rollup.
    pub coinbase: Address,
    /// Base fee shared across the rollup.
    pub base_fee: u64,
    /// Gas limit shared across the rollup.
    pub gas_limit: u64,
}

/// The result of executing one batch, prior to commit.
#[async_trait]
pub trait ComputedBatch: Send + Sync + Debug {
    /// The produced batch header.
    fn batch(&self) -> &Batch;
    /// The produced receipts.
    fn receipts(&self) -> &Receipts;
    /// Commits (or discards, if `persist` is `false`) the resulting state,
    /// returning the post-state root.
    async fn commit(&self, persist: bool) -> B256;
}

/// The deterministic L2 state-transition function, as a trait boundary.
#[async_trait]
pub trait BatchExecutor: Send + Sync + Debug {
    /// The error type returned when execution fails or produces an
    /// inconsistent result.
    type Error: std::fmt::Display + Send + Sync + 'static;
    /// The concrete [`ComputedBatch`] this executor produces.
    type Computed: ComputedBatch;

    /// Creates the genesis batch.
    async fn create_genesis(
        &self,
        l1_proof: B256,
        time: u64,
        coinbase: Address,
        base_fee: u64,
    ) -> Result<Batch, Self::Error>;

    /// Executes a non-genesis batch against the given context.
    async fn compute_batch(&self, ctx: BatchComputeCtx) -> Result<Self::Computed, Self::Error>;
}
