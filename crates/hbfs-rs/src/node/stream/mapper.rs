//! Maps a logical block index of a file to its place in the pointer tree.

use crate::config::{DIRECT_POINTERS, POINTERS_PER_BLOCK};
use crate::error::{FsError, FsResult};
use crate::node::inode::Slot;

const SINGLE_SPAN: u64 = POINTERS_PER_BLOCK;
const DOUBLE_SPAN: u64 = POINTERS_PER_BLOCK * POINTERS_PER_BLOCK;
const TRIPLE_SPAN: u64 = DOUBLE_SPAN * POINTERS_PER_BLOCK;

/// MAX_BLOCKS is the number of logical blocks a single inode can address.
pub const MAX_BLOCKS: u64 = DIRECT_POINTERS + SINGLE_SPAN + DOUBLE_SPAN + TRIPLE_SPAN;

/// Where a logical block lives: the inode slot to start from, then one
/// pointer index per level of indirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPath {
    pub slot: Slot,
    indices: [u64; 3],
    depth: usize,
}

impl BlockPath {
    /// Pointer indices inside each indirect block, outermost first. Empty for
    /// direct blocks.
    #[must_use]
    pub fn indices(&self) -> &[u64] {
        &self.indices[..self.depth]
    }
}

/// `locate` maps logical block `index` to its slot and indirect indices.
///
/// # Errors
/// Returns `InvalidOperation` for indices past the triple-indirect zone.
pub fn locate(index: u64) -> FsResult<BlockPath> {
    if index < DIRECT_POINTERS {
        return Ok(BlockPath {
            slot: Slot::Direct(index),
            indices: [0; 3],
            depth: 0,
        });
    }
    let rel = index - DIRECT_POINTERS;
    if rel < SINGLE_SPAN {
        return Ok(BlockPath {
            slot: Slot::Single,
            indices: [rel, 0, 0],
            depth: 1,
        });
    }
    let rel = rel - SINGLE_SPAN;
    if rel < DOUBLE_SPAN {
        return Ok(BlockPath {
            slot: Slot::Double,
            indices: [rel / SINGLE_SPAN, rel % SINGLE_SPAN, 0],
            depth: 2,
        });
    }
    let rel = rel - DOUBLE_SPAN;
    if rel < TRIPLE_SPAN {
        return Ok(BlockPath {
            slot: Slot::Triple,
            indices: [
                rel / DOUBLE_SPAN,
                (rel / SINGLE_SPAN) % SINGLE_SPAN,
                rel % SINGLE_SPAN,
            ],
            depth: 3,
        });
    }
    Err(FsError::invalid(format!(
        "block {index} is past the largest addressable file ({MAX_BLOCKS} blocks)"
    )))
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod mapper_tests;
