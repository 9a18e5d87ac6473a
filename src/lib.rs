//! Lossless compression and reconstruction of L2 rollup batch sequences for
//! L1 publication: a delta-encoding codec, a secure envelope (authenticated
//! encryption over compression), an L1 ancestor resolver, and the
//! build/reconstruct pipelines that tie them together.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

/// Re-exports the types most callers need to build or reconstruct rollups.
pub mod prelude {
    pub use crate::{
        builder::RollupBuilder,
        config::{CancellationFlag, EngineConfig},
        envelope::{AesGcmZlibEnvelope, SecureEnvelope},
        errors::{EngineError, EngineResult},
        executor::{BatchComputeCtx, BatchExecutor, ComputedBatch},
        reconstructor::{BatchOutcome, BatchReconstructor},
        registry::BatchRegistry,
        store::{Receipts, Store},
        types::{Batch, BatchHeader, CalldataRollupHeader, ExtRollup, L1Block, OuterRollupHeader, Rollup},
    };
}

pub mod ancestor;
pub mod builder;
pub mod codec;
pub mod config;
pub mod delta;
pub mod envelope;
pub mod errors;
pub mod executor;
pub mod reconstructor;
pub mod registry;
pub mod store;
pub mod types;
