//! Engine-internal configuration: the genesis sequence number and the
//! cooperative cancellation flag. No CLI/env parsing belongs here — this is
//! the one piece of configuration the engine itself owns, threaded in at
//! construction rather than read from ambient globals.
//!
//! The AEAD key lives on the [`crate::envelope::AesGcmZlibEnvelope`] each
//! collaborator is constructed with, not here, so there is exactly one place
//! a key can be supplied from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation signal, checked at batch boundaries.
///
/// Not a `CancellationToken` from an async runtime: the engine's suspension
/// points are I/O calls on `Store`/`BatchExecutor`, which are not
/// individually cancellable (§5's atomic-per-batch-commit precondition), so
/// cancellation can only take effect between batches.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// A fresh, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Takes effect at the next batch boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once [`CancellationFlag::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Construction-time configuration for [`crate::reconstructor::BatchReconstructor`]
/// and [`crate::builder::RollupBuilder`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sequence number of the genesis batch.
    pub genesis_seq: u64,
    /// Cooperative cancellation flag, checked once per batch.
    pub cancellation: CancellationFlag,
}

impl EngineConfig {
    /// Builds a config with a fresh, unset cancellation flag.
    pub fn new(genesis_seq: u64) -> Self {
        Self { genesis_seq, cancellation: CancellationFlag::new() }
    }
}
