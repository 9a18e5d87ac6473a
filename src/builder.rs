//! The rollup builder: the inverse of [`crate::reconstructor`]. Given
//! in-memory batches and a block-lookup map, produces an [`ExtRollup`] ready
//! for L1 publication. See `spec.md` §4.6.

use crate::config::EngineConfig;
use crate::delta::build_calldata_header;
use crate::envelope::SecureEnvelope;
use crate::errors::{CodecError, EngineResult};
use crate::store::Store;
use crate::types::{encode_batch_payloads, Batch, ExtRollup, L1Block, OuterRollupHeader};
use alloy_primitives::B256;
use std::collections::BTreeMap;
use tracing::debug;

/// Builds [`ExtRollup`]s from in-memory batch sequences.
#[derive(Debug)]
pub struct RollupBuilder<E, S> {
    envelope: E,
    store: S,
    #[allow(dead_code)]
    config: EngineConfig,
}

impl<E: SecureEnvelope, S: Store> RollupBuilder<E, S> {
    /// Builds a builder over the given envelope, store, and config.
    pub fn new(envelope: E, store: S, config: EngineConfig) -> Self {
        Self { envelope, store, config }
    }

    /// Produces an [`ExtRollup`] for `batches`, given the L1 blocks each
    /// batch's `l1_proof` resolves to. The non-canonical (reorged) sequence
    /// numbers among `batches` are not a caller-supplied parameter: this
    /// queries `store` for them itself, per `spec.md` §4.3 step 3.
    ///
    /// Rejects `compression_l1_head` if it is not among `l1_blocks`
    /// (`spec.md` §4.6's reachability precondition).
    ///
    /// `signer_metadata` is carried through unchanged into the outer header
    /// (`spec.md` §4.6: signed separately by the sequencer, opaque here).
    pub async fn create_ext_rollup(
        &self,
        batches: &[Batch],
        l1_blocks: &BTreeMap<B256, L1Block>,
        compression_l1_head: B256,
        signer_metadata: Vec<u8>,
    ) -> EngineResult<ExtRollup> {
        check_head_reachable(l1_blocks, compression_l1_head)?;
        let header = build_calldata_header(batches, l1_blocks, &self.store).await?;
        debug!(target: "builder", batches = batches.len(), reorgs = header.reorgs.is_some(), "built calldata rollup header");

        let payloads = encode_batch_payloads(&batches.iter().map(|b| b.transactions.clone()).collect::<Vec<_>>());

        Ok(ExtRollup {
            header: OuterRollupHeader { compression_l1_head, signer_metadata },
            calldata_rollup_header: self.envelope.seal(&header.encode()),
            batch_payloads: self.envelope.seal(&payloads),
        })
    }
}

/// Inverse check helper: whether `compression_l1_head` is actually among
/// `l1_blocks`, a precondition §4.6 requires before sealing (the ancestor
/// map must be reachable from the declared head).
pub fn check_head_reachable(
    l1_blocks: &BTreeMap<B256, L1Block>,
    compression_l1_head: B256,
) -> Result<(), CodecError> {
    if l1_blocks.contains_key(&compression_l1_head) {
        Ok(())
    } else {
        Err(CodecError::MissingL1Block(compression_l1_head))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::envelope::AesGcmZlibEnvelope;
    use crate::reconstructor::{BatchOutcome, BatchReconstructor};
    use crate::registry::BatchRegistry;
    use crate::store::{Receipts, Store};
    use crate::types::Batch;
    use crate::executor::{BatchComputeCtx, BatchExecutor, ComputedBatch};
    use alloy_primitives::Address;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeStore {
        l1: Mutex<HashMap<B256, L1Block>>,
        by_seq: Mutex<HashMap<u64, (Batch, bool)>>,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn fetch_block(&self, hash: B256) -> Option<L1Block> {
            self.l1.lock().unwrap().get(&hash).cloned()
        }
        async fn fetch_batch(&self, hash: B256) -> Option<Batch> {
            self.by_seq.lock().unwrap().values().find(|(b, _)| b.header().hash() == hash).map(|(b, _)| b.clone())
        }
        async fn fetch_batch_by_seq(&self, seq: u64) -> Option<Batch> {
            self.by_seq.lock().unwrap().get(&seq).map(|(b, _)| b.clone())
        }
        async fn is_stored_canonical(&self, seq: u64) -> bool {
            self.by_seq.lock().unwrap().get(&seq).map(|(_, canon)| *canon).unwrap_or(false)
        }
        async fn fetch_non_canonical_batches_between(&self, _lo: u64, _hi: u64) -> Vec<Batch> {
            Vec::new()
        }
        async fn store_batch(&self, batch: Batch, canonical: bool) {
            self.by_seq.lock().unwrap().insert(batch.seq_no, (batch, canonical));
        }
        async fn store_executed_batch(&self, batch: Batch, _receipts: Receipts) {
            self.by_seq.lock().unwrap().insert(batch.seq_no, (batch, true));
        }
    }

    #[derive(Debug, Default)]
    struct FakeRegistry;

    #[async_trait]
    impl BatchRegistry for FakeRegistry {
        async fn on_batch_executed(&self, _batch: &Batch, _receipts: &Receipts) {}
    }

    #[derive(Debug)]
    struct FakeComputed(Batch, Receipts);

    #[async_trait]
    impl ComputedBatch for FakeComputed {
        fn batch(&self) -> &Batch {
            &self.0
        }
        fn receipts(&self) -> &Receipts {
            &self.1
        }
        async fn commit(&self, _persist: bool) -> B256 {
            B256::ZERO
        }
    }

    #[derive(Debug, Default)]
    struct FakeExecutor;

    #[async_trait]
    impl BatchExecutor for FakeExecutor {
        type Error = std::convert::Infallible;
        type Computed = FakeComputed;

        async fn create_genesis(
            &self,
            l1_proof: B256,
            time: u64,
            coinbase: Address,
            base_fee: u64,
        ) -> Result<Batch, Self::Error> {
            Ok(Batch {
                seq_no: 0,
                height: 0,
                time,
                l1_proof,
                parent_hash: B256::ZERO,
                tx_root: crate::types::EMPTY_TX_ROOT,
                coinbase,
                base_fee,
                gas_limit: 30_000_000,
                transactions: Vec::new(),
            })
        }

        async fn compute_batch(&self, ctx: BatchComputeCtx) -> Result<Self::Computed, Self::Error> {
            let batch = Batch {
                seq_no: ctx.seq,
                height: ctx.height,
                time: ctx.time,
                l1_proof: ctx.l1_proof,
                parent_hash: ctx.parent_hash,
                tx_root: crate::types::merkle_root(&ctx.transactions),
                coinbase: ctx.coinbase,
                base_fee: ctx.base_fee,
                gas_limit: ctx.gas_limit,
                transactions: ctx.transactions,
            };
            Ok(FakeComputed(batch, Vec::new()))
        }
    }

    #[tokio::test]
    async fn build_then_reconstruct_round_trips_a_canonical_rollup() {
        let l1_hash = B256::repeat_byte(7);
        let mut l1_blocks = BTreeMap::new();
        l1_blocks.insert(l1_hash, L1Block { hash: l1_hash, parent_hash: B256::ZERO, height: 200 });

        let genesis = Batch {
            seq_no: 0,
            height: 0,
            time: 5000,
            l1_proof: l1_hash,
            parent_hash: B256::ZERO,
            tx_root: crate::types::EMPTY_TX_ROOT,
            coinbase: Address::repeat_byte(4),
            base_fee: 500,
            gas_limit: 30_000_000,
            transactions: Vec::new(),
        };
        let next = Batch {
            seq_no: 1,
            height: 1,
            time: 5010,
            l1_proof: l1_hash,
            parent_hash: genesis.header().hash(),
            tx_root: crate::types::EMPTY_TX_ROOT,
            coinbase: genesis.coinbase,
            base_fee: genesis.base_fee,
            gas_limit: genesis.gas_limit,
            transactions: Vec::new(),
        };
        let batches = vec![genesis, next];

        let key = [5u8; 32];
        let builder =
            RollupBuilder::new(AesGcmZlibEnvelope::new(key), FakeStore::default(), EngineConfig::new(0));
        let ext = builder
            .create_ext_rollup(&batches, &l1_blocks, l1_hash, b"sig".to_vec())
            .await
            .unwrap();

        let store = FakeStore::default();
        store.l1.lock().unwrap().insert(l1_hash, L1Block { hash: l1_hash, parent_hash: B256::ZERO, height: 200 });

        let reconstructor = BatchReconstructor::new(
            AesGcmZlibEnvelope::new(key),
            store,
            FakeRegistry,
            FakeExecutor,
            EngineConfig::new(0),
        );

        let outcomes = reconstructor.process_ext_rollup(&ext).await.unwrap();
        assert_eq!(outcomes, vec![BatchOutcome::StoredCanonical, BatchOutcome::StoredCanonical]);
    }

    #[test]
    fn check_head_reachable_rejects_unknown_head() {
        let l1_blocks = BTreeMap::new();
        let err = check_head_reachable(&l1_blocks, B256::repeat_byte(1)).unwrap_err();
        assert!(matches!(err, CodecError::MissingL1Block(_)));
    }
}
