//! The data model: [`Batch`], [`Rollup`], [`CalldataRollupHeader`], [`ExtRollup`].
//!
//! See `spec.md` §3 for the invariants these types must uphold; §6 for the
//! exact wire layout of [`CalldataRollupHeader`].

use crate::codec::{
    decode_address, decode_bigint, decode_bigint_seq, decode_bytes, decode_hash, decode_reorgs,
    decode_u64, encode_address, encode_bigint, encode_bigint_seq, encode_bytes, encode_hash,
    encode_reorgs, encode_u64, BigInt,
};
use crate::errors::CodecError;
use alloy_primitives::{Address, B256};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An L2 block produced by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Batch {
    /// Monotone, gapless sequence number across all of L2 history.
    pub seq_no: u64,
    /// Monotone height across canonical batches only.
    pub height: u64,
    /// Unix seconds.
    pub time: u64,
    /// Hash of the L1 block this batch commits to.
    pub l1_proof: B256,
    /// Hash of the previous canonical batch's header.
    pub parent_hash: B256,
    /// Merkle root over `transactions`.
    pub tx_root: B256,
    /// Fee recipient shared across the rollup.
    pub coinbase: Address,
    /// Base fee shared across the rollup.
    pub base_fee: u64,
    /// Gas limit shared across the rollup.
    pub gas_limit: u64,
    /// Ordered transaction list, as opaque encoded transactions.
    pub transactions: Vec<Vec<u8>>,
}

/// The empty Merkle trie root, used when a batch carries no transactions.
pub const EMPTY_TX_ROOT: B256 = B256::ZERO;

/// A Merkle root over an ordered transaction list.
///
/// The executor/transaction-trie implementation is out of scope (`spec.md`
/// §1); this crate only needs a deterministic placeholder so the builder and
/// reconstructor agree on what to check against a re-derived root header
/// field. Replace with a real trie root when wiring in a concrete executor.
pub fn merkle_root(transactions: &[Vec<u8>]) -> B256 {
    if transactions.is_empty() {
        return EMPTY_TX_ROOT;
    }
    alloy_primitives::keccak256(transactions.concat())
}

/// An L1 block, as seen by the [`crate::ancestor`] resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1Block {
    /// This block's own hash.
    pub hash: B256,
    /// Hash of this block's parent.
    pub parent_hash: B256,
    /// Absolute L1 height.
    pub height: u64,
}

/// A serialized batch header, carried verbatim for reorg exceptions.
pub type SerializedHeader = Vec<u8>;

/// A batch's header fields, excluding its transaction list (which travels
/// separately in `batch_payloads`, §6). This is what `reorgs[i]` carries
/// verbatim, and what [`BatchHeader::hash`] hashes to produce the value
/// used for parent-hash threading (`spec.md` invariant 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHeader {
    /// Monotone, gapless sequence number.
    pub seq_no: u64,
    /// Height at the time this batch was (or would have been) canonical.
    pub height: u64,
    /// Unix seconds.
    pub time: u64,
    /// Hash of the L1 block this batch commits to.
    pub l1_proof: B256,
    /// Hash of the previous canonical batch's header.
    pub parent_hash: B256,
    /// Merkle root over the batch's transactions.
    pub tx_root: B256,
    /// Fee recipient shared across the rollup.
    pub coinbase: Address,
    /// Base fee shared across the rollup.
    pub base_fee: u64,
    /// Gas limit shared across the rollup.
    pub gas_limit: u64,
}

impl BatchHeader {
    /// Serializes this header using the same primitives as
    /// [`CalldataRollupHeader::encode`], so builder and reconstructor agree
    /// on the bytes that get hashed and carried as a reorg exception.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_bigint(&mut out, &BigInt::from_u64(self.seq_no));
        encode_bigint(&mut out, &BigInt::from_u64(self.height));
        encode_u64(&mut out, self.time);
        encode_hash(&mut out, self.l1_proof);
        encode_hash(&mut out, self.parent_hash);
        encode_hash(&mut out, self.tx_root);
        encode_address(&mut out, self.coinbase);
        encode_bigint(&mut out, &BigInt::from_u64(self.base_fee));
        encode_u64(&mut out, self.gas_limit);
        out
    }

    /// Inverse of [`BatchHeader::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut buf = data;
        let seq_no = decode_bigint(&mut buf)?.try_into_u64()?;
        let height = decode_bigint(&mut buf)?.try_into_u64()?;
        let time = decode_u64(&mut buf)?;
        let l1_proof = decode_hash(&mut buf)?;
        let parent_hash = decode_hash(&mut buf)?;
        let tx_root = decode_hash(&mut buf)?;
        let coinbase = decode_address(&mut buf)?;
        let base_fee = decode_bigint(&mut buf)?.try_into_u64()?;
        let gas_limit = decode_u64(&mut buf)?;
        Ok(Self { seq_no, height, time, l1_proof, parent_hash, tx_root, coinbase, base_fee, gas_limit })
    }

    /// The batch header hash used for parent-hash threading.
    pub fn hash(&self) -> B256 {
        alloy_primitives::keccak256(self.encode())
    }
}

impl Batch {
    /// Extracts this batch's [`BatchHeader`] (drops the transaction list).
    pub fn header(&self) -> BatchHeader {
        BatchHeader {
            seq_no: self.seq_no,
            height: self.height,
            time: self.time,
            l1_proof: self.l1_proof,
            parent_hash: self.parent_hash,
            tx_root: self.tx_root,
            coinbase: self.coinbase,
            base_fee: self.base_fee,
            gas_limit: self.gas_limit,
        }
    }

    /// Rebuilds a [`Batch`] from a carried-verbatim header plus its
    /// separately-decoded transaction list (reorg exception path, §4.5).
    pub fn from_header(header: BatchHeader, transactions: Vec<Vec<u8>>) -> Self {
        Self {
            seq_no: header.seq_no,
            height: header.height,
            time: header.time,
            l1_proof: header.l1_proof,
            parent_hash: header.parent_hash,
            tx_root: header.tx_root,
            coinbase: header.coinbase,
            base_fee: header.base_fee,
            gas_limit: header.gas_limit,
            transactions,
        }
    }
}

/// An ordered, contiguous-by-seq list of batches plus the L1 context the
/// sequencer built them against. Exists only on the build side; never
/// serialized directly (its derived form is [`CalldataRollupHeader`]).
#[derive(Debug, Clone)]
pub struct Rollup {
    /// Batches in ascending seq order. Index 0 must be canonical (`DESIGN.md`
    /// Open Question 2).
    pub batches: Vec<Batch>,
    /// L1 block this rollup's ancestor map is reachable from.
    pub compression_l1_head: B256,
    /// Map from every `l1_proof` referenced by `batches` to its L1 block.
    pub l1_blocks: BTreeMap<B256, L1Block>,
}

/// On-wire rollup metadata, after decrypt + decompress. Field order below is
/// canonical; see `spec.md` §6 for the authoritative layout.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalldataRollupHeader {
    /// Sequence number of batch index 0.
    pub first_batch_seq: u64,
    /// Height of the first non-reorg batch in the rollup.
    pub first_canon_height: u64,
    /// Parent hash of that same batch: the anchor into the existing chain.
    pub first_canon_parent_hash: B256,
    /// Wall time of batch index 0.
    pub start_time: u64,
    /// `time_deltas[i] = batches[i].time - batches[i-1].time`; `[0]` is a placeholder (0).
    pub time_deltas: Vec<u64>,
    /// `reorgs[i]`: empty if canonical, else the full serialized header of a non-canonical batch.
    /// Absent (not merely all-empty) when no batch in the rollup is a reorg.
    pub reorgs: Option<Vec<SerializedHeader>>,
    /// `l1_height_deltas[0]` is absolute; `[i>0]` are signed deltas from the previous entry.
    pub l1_height_deltas: Vec<i64>,
    /// Coinbase shared across all batches in this rollup.
    pub coinbase: Address,
    /// Base fee shared across all batches in this rollup.
    pub base_fee: u64,
    /// Gas limit shared across all batches in this rollup.
    pub gas_limit: u64,
}

impl CalldataRollupHeader {
    /// Number of batches this header describes.
    pub fn len(&self) -> usize {
        self.time_deltas.len()
    }

    /// `true` if this header describes zero batches (never produced by the
    /// builder, but checked for defensively on decode).
    pub fn is_empty(&self) -> bool {
        self.time_deltas.is_empty()
    }

    fn check_invariants(&self) -> Result<(), CodecError> {
        if self.l1_height_deltas.len() != self.time_deltas.len() {
            return Err(CodecError::LengthMismatch {
                name: "l1_height_deltas",
                found: self.l1_height_deltas.len(),
                expected: self.time_deltas.len(),
            });
        }
        if let Some(reorgs) = &self.reorgs {
            if reorgs.len() != self.time_deltas.len() {
                return Err(CodecError::LengthMismatch {
                    name: "reorgs",
                    found: reorgs.len(),
                    expected: self.time_deltas.len(),
                });
            }
            if reorgs.first().is_some_and(|h| !h.is_empty()) {
                return Err(CodecError::NonCanonicalGenesisIndex);
            }
        }
        Ok(())
    }

    /// Serializes per the canonical field order in `spec.md` §6.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_bigint(&mut out, &BigInt::from_u64(self.first_batch_seq));
        encode_bigint(&mut out, &BigInt::from_u64(self.first_canon_height));
        encode_hash(&mut out, self.first_canon_parent_hash);
        encode_u64(&mut out, self.start_time);
        encode_bigint_seq(
            &mut out,
            &self.time_deltas.iter().map(|d| BigInt::from_u64(*d)).collect::<Vec<_>>(),
        );
        encode_reorgs(&mut out, self.reorgs.as_deref());
        encode_bigint_seq(
            &mut out,
            &self.l1_height_deltas.iter().map(|d| BigInt::from_i128(*d as i128)).collect::<Vec<_>>(),
        );
        encode_address(&mut out, self.coinbase);
        encode_bigint(&mut out, &BigInt::from_u64(self.base_fee));
        encode_u64(&mut out, self.gas_limit);
        out
    }

    /// Inverse of [`CalldataRollupHeader::encode`].
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut buf = data;
        let first_batch_seq = decode_bigint(&mut buf)?.try_into_u64()?;
        let first_canon_height = decode_bigint(&mut buf)?.try_into_u64()?;
        let first_canon_parent_hash = decode_hash(&mut buf)?;
        let start_time = decode_u64(&mut buf)?;

        let time_deltas_raw = decode_bigint_seq(&mut buf)?;
        let mut time_deltas = Vec::with_capacity(time_deltas_raw.len());
        for (i, d) in time_deltas_raw.iter().enumerate() {
            if i > 0 && d.is_negative() {
                return Err(CodecError::NegativeTimeDelta { index: i });
            }
            time_deltas.push(d.try_into_u64()?);
        }

        let reorgs = decode_reorgs(&mut buf)?;

        let l1_height_deltas_raw = decode_bigint_seq(&mut buf)?;
        let mut l1_height_deltas = Vec::with_capacity(l1_height_deltas_raw.len());
        for d in &l1_height_deltas_raw {
            l1_height_deltas.push(d.try_into_i64()?);
        }

        let coinbase = decode_address(&mut buf)?;
        let base_fee = decode_bigint(&mut buf)?.try_into_u64()?;
        let gas_limit = decode_u64(&mut buf)?;

        let header = Self {
            first_batch_seq,
            first_canon_height,
            first_canon_parent_hash,
            start_time,
            time_deltas,
            reorgs,
            l1_height_deltas,
            coinbase,
            base_fee,
            gas_limit,
        };
        header.check_invariants()?;
        Ok(header)
    }
}

/// The outer, plaintext rollup header. Signed separately by the sequencer;
/// this crate treats it as an opaque pass-through except for
/// `compression_l1_head`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OuterRollupHeader {
    /// The L1 head the ancestor resolver begins traversal from.
    pub compression_l1_head: B256,
    /// Opaque signer/metadata bytes outside this engine's concern.
    pub signer_metadata: Vec<u8>,
}

/// The wire record published to L1 calldata. See `spec.md` §6.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtRollup {
    /// Plaintext outer header.
    pub header: OuterRollupHeader,
    /// Sealed [`CalldataRollupHeader`] bytes.
    pub calldata_rollup_header: Vec<u8>,
    /// Sealed `[[Transaction]]` bytes, outer index = batch index.
    pub batch_payloads: Vec<u8>,
}

/// Encodes `[[Transaction]]` (one transaction list per batch) for sealing.
pub fn encode_batch_payloads(payloads: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut out = Vec::new();
    let encoded_batches: Vec<Vec<u8>> = payloads
        .iter()
        .map(|txs| {
            let mut inner = Vec::new();
            encode_seq_of_byte_strings(&mut inner, txs);
            inner
        })
        .collect();
    encode_seq_of_byte_strings(&mut out, &encoded_batches);
    out
}

/// Decodes `[[Transaction]]` written by [`encode_batch_payloads`].
pub fn decode_batch_payloads(data: &[u8]) -> Result<Vec<Vec<Vec<u8>>>, CodecError> {
    let mut buf = data;
    let outer = decode_seq_of_byte_strings(&mut buf)?;
    outer.iter().map(|inner| decode_seq_of_byte_strings(&mut inner.as_slice())).collect()
}

fn encode_seq_of_byte_strings(out: &mut Vec<u8>, items: &[Vec<u8>]) {
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for item in items {
        encode_bytes(out, item);
    }
}

fn decode_seq_of_byte_strings(buf: &mut &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
    let mut tmp = *buf;
    let count_bytes = {
        if tmp.len() < 4 {
            return Err(CodecError::Truncated { expected: 4, found: tmp.len() });
        }
        let (head, tail) = tmp.split_at(4);
        tmp = tail;
        head
    };
    let count = u32::from_be_bytes(count_bytes.try_into().expect("4 bytes")) as usize;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(decode_bytes(&mut tmp)?);
    }
    *buf = tmp;
    Ok(items)
}
