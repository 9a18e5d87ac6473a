//! The batch reconstructor: processes one [`ExtRollup`] end to end, per
//! `spec.md` §4.5. Drives the `Pending -> {Skipped, StoredReorg,
//! StoredCanonical}` state machine of §4.7, one match per batch
//! (`BatchCase`, the redesign named in §9).

use crate::ancestor::resolve_ancestors;
use crate::config::EngineConfig;
use crate::delta::reconstruct_deltas;
use crate::envelope::SecureEnvelope;
use crate::errors::{EngineError, EngineResult};
use crate::executor::{BatchComputeCtx, BatchExecutor, ComputedBatch};
use crate::registry::BatchRegistry;
use crate::store::Store;
use crate::types::{decode_batch_payloads, merkle_root, Batch, BatchHeader, CalldataRollupHeader, ExtRollup};
use alloy_primitives::B256;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// The three ways a single batch is handled while reconstructing a rollup.
#[derive(Debug, Clone)]
enum BatchCase {
    /// A non-canonical batch, carried verbatim; stored but never advances
    /// `parent_hash`.
    Reorg(BatchHeader),
    /// The rollup's genesis batch.
    Genesis,
    /// Any other canonical batch.
    Default,
}

/// Outcome of the `Pending` state for one batch, per `spec.md` §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Already stored and canonical; `parent_hash` adopted from the store.
    Skipped,
    /// Stored as a non-canonical reorg exception.
    StoredReorg,
    /// Freshly executed and committed as the new canonical tip.
    StoredCanonical,
}

/// Drives `CalldataRollupHeader`/`[[Transaction]]` reconstruction and
/// replay against a [`Store`], [`BatchExecutor`], and [`BatchRegistry`].
#[derive(Debug)]
pub struct BatchReconstructor<E, S, R, X> {
    envelope: E,
    store: S,
    registry: R,
    executor: X,
    config: EngineConfig,
}

impl<E, S, R, X> BatchReconstructor<E, S, R, X>
where
    E: SecureEnvelope,
    S: Store,
    R: BatchRegistry,
    X: BatchExecutor,
{
    /// Builds a reconstructor over the given collaborators and config.
    pub fn new(envelope: E, store: S, registry: R, executor: X, config: EngineConfig) -> Self {
        Self { envelope, store, registry, executor, config }
    }

    /// Processes one [`ExtRollup`], replaying every batch it describes.
    ///
    /// Per `spec.md` §4.5 step 6: on any executor error the whole call fails
    /// with [`EngineError::ExecutionMismatch`]; batches already committed in
    /// earlier loop iterations remain (they are independently valid).
    pub async fn process_ext_rollup(&self, ext: &ExtRollup) -> EngineResult<Vec<BatchOutcome>> {
        let header_bytes = self.envelope.open(&ext.calldata_rollup_header)?;
        let payload_bytes = self.envelope.open(&ext.batch_payloads)?;

        let header = CalldataRollupHeader::decode(&header_bytes)?;
        let batch_txs = decode_batch_payloads(&payload_bytes)?;
        if batch_txs.len() != header.len() {
            return Err(EngineError::MalformedInput(crate::errors::CodecError::LengthMismatch {
                name: "batch_payloads",
                found: batch_txs.len(),
                expected: header.len(),
            }));
        }

        let facts = reconstruct_deltas(&header)?;
        let h_min = facts.iter().map(|f| f.l1_height).min().unwrap_or(0);
        if h_min < 0 {
            return Err(EngineError::L1Gap { required: 0, available: 0 });
        }
        let ancestor_blocks =
            resolve_ancestors(&self.store, ext.header.compression_l1_head, h_min as u64).await?;
        let height_to_hash: BTreeMap<u64, B256> =
            ancestor_blocks.values().map(|b| (b.height, b.hash)).collect();

        let mut parent_hash = header.first_canon_parent_hash;
        let mut outcomes = Vec::with_capacity(header.len());

        for (i, fact) in facts.iter().enumerate() {
            if self.config.cancellation.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let l1_height = u64::try_from(fact.l1_height)
                .map_err(|_| EngineError::L1Gap { required: 0, available: h_min.max(0) as u64 })?;
            let l1_proof = *height_to_hash
                .get(&l1_height)
                .ok_or(EngineError::L1Gap { required: l1_height, available: h_min as u64 })?;

            let txs = batch_txs[i].clone();
            let tx_root = merkle_root(&txs);

            let case = match &fact.reorg_header {
                Some(h) => BatchCase::Reorg(h.clone()),
                None if fact.seq == self.config.genesis_seq => BatchCase::Genesis,
                None => BatchCase::Default,
            };

            debug!(target: "reconstructor", seq = fact.seq, height = fact.height, "processing batch");

            match case {
                BatchCase::Reorg(carried) => {
                    let batch = Batch::from_header(carried, txs);
                    self.store.store_batch(batch, false).await;
                    outcomes.push(BatchOutcome::StoredReorg);
                    continue;
                }
                BatchCase::Genesis => {
                    if self.store.is_stored_canonical(fact.seq).await {
                        let existing = self.store.fetch_batch_by_seq(fact.seq).await.ok_or_else(|| {
                            EngineError::ExecutionMismatch {
                                seq: fact.seq,
                                reason: "is_stored_canonical true but fetch_batch_by_seq missed".into(),
                            }
                        })?;
                        warn!(target: "reconstructor", seq = fact.seq, "batch already stored, skipping");
                        parent_hash = existing.header().hash();
                        outcomes.push(BatchOutcome::Skipped);
                        continue;
                    }

                    let batch = self
                        .executor
                        .create_genesis(l1_proof, fact.time, header.coinbase, header.base_fee)
                        .await
                        .map_err(|e| EngineError::ExecutionMismatch { seq: fact.seq, reason: e.to_string() })?;
                    self.store.store_executed_batch(batch.clone(), Vec::new()).await;
                    self.registry.on_batch_executed(&batch, &Vec::new()).await;
                    parent_hash = batch.header().hash();
                    outcomes.push(BatchOutcome::StoredCanonical);
                }
                BatchCase::Default => {
                    if self.store.is_stored_canonical(fact.seq).await {
                        let existing = self.store.fetch_batch_by_seq(fact.seq).await.ok_or_else(|| {
                            EngineError::ExecutionMismatch {
                                seq: fact.seq,
                                reason: "is_stored_canonical true but fetch_batch_by_seq missed".into(),
                            }
                        })?;
                        warn!(target: "reconstructor", seq = fact.seq, "batch already stored, skipping");
                        parent_hash = existing.header().hash();
                        outcomes.push(BatchOutcome::Skipped);
                        continue;
                    }

                    let ctx = BatchComputeCtx {
                        seq: fact.seq,
                        height: fact.height,
                        l1_proof,
                        parent_hash,
                        transactions: txs,
                        time: fact.time,
                        coinbase: header.coinbase,
                        base_fee: header.base_fee,
                        gas_limit: header.gas_limit,
                    };
                    let computed = self.executor.compute_batch(ctx).await.map_err(|e| {
                        error!(target: "reconstructor", seq = fact.seq, error = %e, "executor failed");
                        EngineError::ExecutionMismatch { seq: fact.seq, reason: e.to_string() }
                    })?;
                    let _post_state = computed.commit(true).await;
                    if computed.batch().tx_root != tx_root {
                        return Err(EngineError::ExecutionMismatch {
                            seq: fact.seq,
                            reason: "computed tx_root does not match decoded transactions".into(),
                        });
                    }
                    self.store
                        .store_executed_batch(computed.batch().clone(), computed.receipts().clone())
                        .await;
                    self.registry.on_batch_executed(computed.batch(), computed.receipts()).await;
                    parent_hash = computed.batch().header().hash();
                    outcomes.push(BatchOutcome::StoredCanonical);
                }
            }
        }

        Ok(outcomes)
    }
}
