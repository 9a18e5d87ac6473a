//! The delta encoder: derives a [`CalldataRollupHeader`] from an ordered
//! batch list, and the inverse — reconstructing per-batch facts from a
//! decoded header. See `spec.md` §4.3 for the algorithm this mirrors.

use crate::errors::{CodecError, EngineError};
use crate::store::Store;
use crate::types::{Batch, BatchHeader, CalldataRollupHeader, L1Block};
use alloy_primitives::B256;
use std::collections::{BTreeMap, BTreeSet};

/// Builds a [`CalldataRollupHeader`] from `batches`, delta-encoding time and
/// L1 height against the previous entry and carrying non-canonical batches
/// verbatim in `reorgs`.
///
/// The non-canonical set is not supplied by the caller: this queries `store`
/// for every non-canonical batch with seq in `[batches[0].seq_no,
/// batches[-1].seq_no]` itself, per `spec.md` §4.3 step 3.
///
/// `l1_blocks` must contain an entry for every batch's `l1_proof`; it is
/// used only to resolve absolute L1 heights, never written to the header
/// directly beyond `l1_height_deltas[0]`.
pub async fn build_calldata_header(
    batches: &[Batch],
    l1_blocks: &BTreeMap<B256, L1Block>,
    store: &dyn Store,
) -> Result<CalldataRollupHeader, CodecError> {
    let Some(first) = batches.first() else {
        return Err(CodecError::EmptyRollup);
    };
    let last_seq = batches.last().expect("checked non-empty above").seq_no;
    let non_canonical_seqs: BTreeSet<u64> = store
        .fetch_non_canonical_batches_between(first.seq_no, last_seq)
        .await
        .into_iter()
        .map(|b| b.seq_no)
        .collect();

    if non_canonical_seqs.contains(&first.seq_no) {
        return Err(CodecError::NonCanonicalGenesisIndex);
    }

    let first_height = l1_height_of(l1_blocks, first)?;

    let mut time_deltas = Vec::with_capacity(batches.len());
    let mut l1_height_deltas = Vec::with_capacity(batches.len());
    let mut reorgs: Vec<Vec<u8>> = Vec::with_capacity(batches.len());
    let mut any_reorg = false;
    let mut prev_height = first_height;

    for (i, batch) in batches.iter().enumerate() {
        if i == 0 {
            time_deltas.push(0);
            l1_height_deltas.push(first_height as i64);
        } else {
            let prev = &batches[i - 1];
            if batch.time < prev.time {
                return Err(CodecError::NegativeTimeDelta { index: i });
            }
            time_deltas.push(batch.time - prev.time);

            let height = l1_height_of(l1_blocks, batch)?;
            l1_height_deltas.push(height as i64 - prev_height as i64);
            prev_height = height;
        }

        if non_canonical_seqs.contains(&batch.seq_no) {
            any_reorg = true;
            reorgs.push(batch.header().encode());
        } else {
            reorgs.push(Vec::new());
        }
    }

    Ok(CalldataRollupHeader {
        first_batch_seq: first.seq_no,
        first_canon_height: first.height,
        first_canon_parent_hash: first.parent_hash,
        start_time: first.time,
        time_deltas,
        reorgs: any_reorg.then_some(reorgs),
        l1_height_deltas,
        coinbase: first.coinbase,
        base_fee: first.base_fee,
        gas_limit: first.gas_limit,
    })
}

fn l1_height_of(l1_blocks: &BTreeMap<B256, L1Block>, batch: &Batch) -> Result<u64, CodecError> {
    l1_blocks.get(&batch.l1_proof).map(|b| b.height).ok_or(CodecError::MissingL1Block(batch.l1_proof))
}

/// Per-batch facts recovered from a [`CalldataRollupHeader`], prior to
/// L1-ancestor resolution or execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBatchFacts {
    /// Sequence number.
    pub seq: u64,
    /// Wall time.
    pub time: u64,
    /// Absolute L1 height. Signed: a header with a large negative delta run
    /// can decode to a height below any block the ancestor resolver
    /// actually reaches, which is an [`EngineError::L1Gap`] detected
    /// downstream, not here.
    pub l1_height: i64,
    /// Canonical height, only meaningful when `reorg_header` is `None`.
    pub height: u64,
    /// `Some(header)` if this batch is a reorg exception, carried verbatim.
    pub reorg_header: Option<BatchHeader>,
}

/// Reconstructs per-batch facts from a decoded header, per `spec.md`
/// invariant 2 (`height(k) = first_canon_height + canonical_count_before_k`).
pub fn reconstruct_deltas(header: &CalldataRollupHeader) -> Result<Vec<DecodedBatchFacts>, EngineError> {
    let mut facts = Vec::with_capacity(header.len());
    let mut time = header.start_time;
    let mut l1_height = header.l1_height_deltas.first().copied().unwrap_or(0);
    let mut canonical_seen: u64 = 0;

    for i in 0..header.len() {
        if i > 0 {
            time += header.time_deltas[i];
            l1_height += header.l1_height_deltas[i];
        }

        let reorg_header = match &header.reorgs {
            Some(reorgs) if !reorgs[i].is_empty() => Some(BatchHeader::decode(&reorgs[i])?),
            _ => None,
        };

        let height = match &reorg_header {
            Some(h) => h.height,
            None => {
                let height = header.first_canon_height + canonical_seen;
                canonical_seen += 1;
                height
            }
        };

        facts.push(DecodedBatchFacts {
            seq: header.first_batch_seq + i as u64,
            time,
            l1_height,
            height,
            reorg_header,
        });
    }

    Ok(facts)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::Receipts;
    use crate::types::Batch;
    use alloy_primitives::Address;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeStore {
        by_seq: Mutex<HashMap<u64, (Batch, bool)>>,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn fetch_block(&self, _hash: B256) -> Option<L1Block> {
            None
        }
        async fn fetch_batch(&self, _hash: B256) -> Option<Batch> {
            None
        }
        async fn fetch_batch_by_seq(&self, seq: u64) -> Option<Batch> {
            self.by_seq.lock().unwrap().get(&seq).map(|(b, _)| b.clone())
        }
        async fn is_stored_canonical(&self, seq: u64) -> bool {
            self.by_seq.lock().unwrap().get(&seq).map(|(_, canon)| *canon).unwrap_or(false)
        }
        async fn fetch_non_canonical_batches_between(&self, lo: u64, hi: u64) -> Vec<Batch> {
            self.by_seq
                .lock()
                .unwrap()
                .values()
                .filter(|(b, canon)| !canon && b.seq_no >= lo && b.seq_no <= hi)
                .map(|(b, _)| b.clone())
                .collect()
        }
        async fn store_batch(&self, batch: Batch, canonical: bool) {
            self.by_seq.lock().unwrap().insert(batch.seq_no, (batch, canonical));
        }
        async fn store_executed_batch(&self, batch: Batch, _receipts: Receipts) {
            self.by_seq.lock().unwrap().insert(batch.seq_no, (batch, true));
        }
    }

    fn block(hash: B256, parent_hash: B256, height: u64) -> L1Block {
        L1Block { hash, parent_hash, height }
    }

    fn batch(seq_no: u64, height: u64, time: u64, l1_proof: B256, parent_hash: B256) -> Batch {
        Batch {
            seq_no,
            height,
            time,
            l1_proof,
            parent_hash,
            tx_root: B256::ZERO,
            coinbase: Address::repeat_byte(9),
            base_fee: 1_000_000,
            gas_limit: 30_000_000,
            transactions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn builds_and_reconstructs_all_canonical() {
        let l1_a = B256::repeat_byte(1);
        let l1_b = B256::repeat_byte(2);
        let l1_c = B256::repeat_byte(3);
        let mut l1_blocks = BTreeMap::new();
        l1_blocks.insert(l1_a, block(l1_a, B256::ZERO, 100));
        l1_blocks.insert(l1_b, block(l1_b, l1_a, 101));
        l1_blocks.insert(l1_c, block(l1_c, l1_b, 103));

        let b0 = batch(10, 50, 1000, l1_a, B256::repeat_byte(0xaa));
        let b1 = batch(11, 51, 1005, l1_b, b0.header().hash());
        let b2 = batch(12, 52, 1020, l1_c, b1.header().hash());
        let batches = vec![b0, b1, b2];

        let store = FakeStore::default();
        let header = build_calldata_header(&batches, &l1_blocks, &store).await.unwrap();
        assert_eq!(header.reorgs, None);
        assert_eq!(header.time_deltas, vec![0, 5, 15]);
        assert_eq!(header.l1_height_deltas, vec![100, 1, 2]);

        let facts = reconstruct_deltas(&header).unwrap();
        assert_eq!(facts.len(), 3);
        for (i, (fact, batch)) in facts.iter().zip(batches.iter()).enumerate() {
            assert_eq!(fact.seq, batch.seq_no, "index {i}");
            assert_eq!(fact.time, batch.time, "index {i}");
            assert_eq!(fact.height, batch.height, "index {i}");
            assert!(fact.reorg_header.is_none());
        }
    }

    #[tokio::test]
    async fn reorg_in_middle_carries_verbatim_header_and_skips_height_count() {
        let l1_a = B256::repeat_byte(1);
        let l1_b = B256::repeat_byte(2);
        let l1_c = B256::repeat_byte(3);
        let mut l1_blocks = BTreeMap::new();
        l1_blocks.insert(l1_a, block(l1_a, B256::ZERO, 100));
        l1_blocks.insert(l1_b, block(l1_b, l1_a, 101));
        l1_blocks.insert(l1_c, block(l1_c, l1_b, 102));

        let b0 = batch(10, 50, 1000, l1_a, B256::repeat_byte(0xaa));
        let reorged = batch(11, 999, 1005, l1_b, b0.header().hash());
        let b2 = batch(12, 51, 1010, l1_c, b0.header().hash());
        let batches = vec![b0.clone(), reorged.clone(), b2.clone()];

        let store = FakeStore::default();
        store.store_batch(reorged.clone(), false).await;

        let header = build_calldata_header(&batches, &l1_blocks, &store).await.unwrap();
        let reorgs = header.reorgs.as_ref().unwrap();
        assert!(reorgs[0].is_empty());
        assert!(!reorgs[1].is_empty());
        assert!(reorgs[2].is_empty());

        let facts = reconstruct_deltas(&header).unwrap();
        assert_eq!(facts[1].reorg_header.as_ref().unwrap().height, reorged.height);
        // The reorg does not advance the canonical height counter.
        assert_eq!(facts[2].height, b2.height);
    }

    #[tokio::test]
    async fn rejects_non_canonical_genesis() {
        let l1_a = B256::repeat_byte(1);
        let mut l1_blocks = BTreeMap::new();
        l1_blocks.insert(l1_a, block(l1_a, B256::ZERO, 100));
        let b0 = batch(10, 50, 1000, l1_a, B256::ZERO);

        let store = FakeStore::default();
        store.store_batch(b0.clone(), false).await;

        let err = build_calldata_header(&[b0], &l1_blocks, &store).await.unwrap_err();
        assert!(matches!(err, CodecError::NonCanonicalGenesisIndex));
    }

    #[tokio::test]
    async fn rejects_empty_batch_list() {
        let store = FakeStore::default();
        let err = build_calldata_header(&[], &BTreeMap::new(), &store).await.unwrap_err();
        assert!(matches!(err, CodecError::EmptyRollup));
    }

    #[tokio::test]
    async fn rejects_negative_time_delta() {
        let l1_a = B256::repeat_byte(1);
        let mut l1_blocks = BTreeMap::new();
        l1_blocks.insert(l1_a, block(l1_a, B256::ZERO, 100));
        let b0 = batch(10, 50, 1000, l1_a, B256::ZERO);
        let b1 = batch(11, 51, 999, l1_a, b0.header().hash());

        let store = FakeStore::default();
        let err = build_calldata_header(&[b0, b1], &l1_blocks, &store).await.unwrap_err();
        assert!(matches!(err, CodecError::NegativeTimeDelta { index: 1 }));
    }
}
