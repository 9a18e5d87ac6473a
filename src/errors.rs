//! Error kinds thrown across the compression engine.

use alloy_primitives::B256;
use thiserror::Error;

/// A result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the [`crate::codec`] module.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before a length-prefixed field could be read in full.
    #[error("truncated input: expected at least {expected} more bytes, found {found}")]
    Truncated {
        /// Bytes required to complete the field.
        expected: usize,
        /// Bytes actually remaining.
        found: usize,
    },
    /// A length prefix did not match the data that followed it.
    #[error("bad length prefix: declared {declared}, read {read}")]
    BadLengthPrefix {
        /// Declared length.
        declared: usize,
        /// Length actually available.
        read: usize,
    },
    /// A big integer did not fit in the requested native width.
    #[error("integer overflow decoding a {width}-bit value")]
    Overflow {
        /// Requested native width in bits.
        width: u32,
    },
    /// A batch time delta decoded as negative, which §4.3 forbids.
    #[error("negative time delta at batch index {index}")]
    NegativeTimeDelta {
        /// Index of the offending batch.
        index: usize,
    },
    /// `reorgs` was present as an empty sequence rather than absent or populated.
    #[error("reorgs field must be absent or non-empty, found an empty sequence")]
    EmptyReorgsSequence,
    /// Batch index 0 was encoded as a reorg, which §9 forbids.
    #[error("batch index 0 must be canonical")]
    NonCanonicalGenesisIndex,
    /// One of the three parallel vectors (`batch_payloads`, `time_deltas`,
    /// `l1_height_deltas`, and `reorgs` if present) had a mismatched length.
    #[error("mismatched vector lengths: {name} has {found}, expected {expected}")]
    LengthMismatch {
        /// Name of the offending field.
        name: &'static str,
        /// Its length.
        found: usize,
        /// The length it was expected to match.
        expected: usize,
    },
    /// A rollup with zero batches cannot be built or decoded.
    #[error("rollup has no batches")]
    EmptyRollup,
    /// A batch's `l1_proof` was not present in the supplied L1 block map
    /// while building a [`crate::types::CalldataRollupHeader`].
    #[error("batch references unknown L1 block {0}")]
    MissingL1Block(B256),
}

/// Errors surfaced by the [`crate::envelope`] module.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// AEAD tag verification failed, or the ciphertext was too short to contain a nonce.
    #[error("authentication failure opening sealed blob")]
    AuthFailure,
    /// Decompression of the plaintext failed, or it was tagged with an unknown format.
    #[error("compression failure: {0}")]
    CompressionFailure(String),
}

/// Errors surfaced by the [`crate::ancestor`] module.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AncestorError {
    /// A parent-hash lookup missed in the [`crate::store::Store`].
    #[error("missing L1 block {0}")]
    MissingL1Block(B256),
}

/// Top-level error kind for the compression engine, per `spec.md` §7.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Decode failure, length mismatch, or negative time delta.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] CodecError),
    /// Envelope decryption or integrity check failed.
    #[error("authentication failure")]
    AuthFailure,
    /// Envelope decompression failed.
    #[error("compression failure: {0}")]
    CompressionFailure(String),
    /// The L1 ancestor resolver could not walk deep enough.
    #[error("missing L1 block {0}")]
    MissingL1Block(B256),
    /// A resolved L1 height is below the ancestor map's minimum.
    #[error("L1 gap: batch requires height {required}, resolver only reaches {available}")]
    L1Gap {
        /// Height required by a decoded delta.
        required: u64,
        /// Lowest height the ancestor map actually covers.
        available: u64,
    },
    /// The executor returned an error, or a reconstructed hash did not match.
    #[error("execution mismatch at seq {seq}: {reason}")]
    ExecutionMismatch {
        /// Sequence number of the offending batch.
        seq: u64,
        /// Human-readable cause.
        reason: String,
    },
    /// Cooperative shutdown observed at a batch boundary.
    #[error("cancelled")]
    Cancelled,
}

impl From<EnvelopeError> for EngineError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::AuthFailure => Self::AuthFailure,
            EnvelopeError::CompressionFailure(msg) => Self::CompressionFailure(msg),
        }
    }
}

impl From<AncestorError> for EngineError {
    fn from(e: AncestorError) -> Self {
        match e {
            AncestorError::MissingL1Block(hash) => Self::MissingL1Block(hash),
        }
    }
}
