//! The L1 ancestor resolver: an iterative parent-hash walk from
//! `compression_l1_head` down to the lowest L1 height referenced by a
//! rollup's batches. See `spec.md` §4.4 and the redesign note in §9
//! (iterative, not recursive, to avoid unbounded stack growth on a long
//! L1 reorg depth).

use crate::errors::AncestorError;
use crate::store::Store;
use crate::types::L1Block;
use alloy_primitives::B256;
use std::collections::BTreeMap;
use tracing::debug;

/// Walks backwards from `head` via parent-hash pointers until an L1 block at
/// height `h_min` or lower is reached, returning every block visited keyed
/// by hash.
///
/// Returns [`AncestorError::MissingL1Block`] if the walk runs off the end of
/// the [`Store`] before reaching `h_min`.
pub async fn resolve_ancestors(
    store: &dyn Store,
    head: B256,
    h_min: u64,
) -> Result<BTreeMap<B256, L1Block>, AncestorError> {
    let mut blocks = BTreeMap::new();
    let mut cursor = head;

    loop {
        let block = store.fetch_block(cursor).await.ok_or(AncestorError::MissingL1Block(cursor))?;
        debug!(target: "ancestor", hash = %block.hash, height = block.height, "visited L1 block");
        let height = block.height;
        let parent_hash = block.parent_hash;
        blocks.insert(block.hash, block);

        if height <= h_min {
            return Ok(blocks);
        }
        cursor = parent_hash;
    }
}
