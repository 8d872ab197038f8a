//! Allocation bitmap with a logarithmic first-free search.
//!
//! Bit `i` lives in byte `i / 8`, most significant bit first; 1 means
//! allocated. On load the bitmap bytes become the leaves of an AND tree:
//! each parent is the AND of its two children, an unpaired trailing node is
//! promoted as is, and a value of `0xFF` marks a fully allocated subtree.

#[cfg(test)]
mod bitmap_tests;

use tracing::{debug, warn};

use crate::error::{FsError, FsResult, Resource};
use crate::storage::medium::Medium;
use crate::storage::store::BlockStore;

const FULL: u8 = 0xFF;

pub struct Bitmap {
    resource: Resource,
    base: u64,
    bits: u64,
    /// `levels[0]` holds the leaf bytes, the last level holds the root.
    /// Leaves carry padding bits past `bits` as set.
    levels: Vec<Vec<u8>>,
}

impl Bitmap {
    /// Loads `ceil(bits / 8)` bytes at `base` and builds the search tree.
    pub fn load<M: Medium>(
        store: &mut BlockStore<M>,
        resource: Resource,
        base: u64,
        bits: u64,
    ) -> FsResult<Self> {
        let len = usize::try_from(bits.div_ceil(8))
            .map_err(|_| FsError::corrupt("bitmap length exceeds addressable size"))?;
        let mut leaves = store.read_at(base, len)?;
        let pad = padding_mask(bits);
        if let Some(last) = leaves.last_mut() {
            *last |= pad;
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|l| l.len() > 1) {
            let parents = level
                .chunks(2)
                .map(|pair| pair.iter().fold(FULL, |acc, b| acc & b))
                .collect();
            levels.push(parents);
        }

        Ok(Self {
            resource,
            base,
            bits,
            levels,
        })
    }

    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.bits
    }

    /// Claims the lowest free bit and returns its index.
    pub fn allocate_first_free<M: Medium>(&mut self, store: &mut BlockStore<M>) -> FsResult<u64> {
        let root = self.levels.last().and_then(|l| l.first()).copied();
        if root.is_none_or(|v| v == FULL) {
            return Err(FsError::CapacityExhausted(self.resource));
        }

        let mut idx = 0usize;
        for level in (1..self.levels.len()).rev() {
            let left = idx * 2;
            idx = if self.levels[level - 1][left] == FULL {
                left + 1
            } else {
                left
            };
        }

        let byte = self.levels[0][idx];
        let bit = byte.leading_ones();
        let updated = byte | (0x80 >> bit);
        self.store_leaf(store, idx, updated)?;

        let index = idx as u64 * 8 + u64::from(bit);
        debug!(resource = %self.resource, index, "allocated");
        Ok(index)
    }

    /// Clears bit `index`. Returns `false` without touching anything if the
    /// bit was already free.
    pub fn release<M: Medium>(&mut self, store: &mut BlockStore<M>, index: u64) -> FsResult<bool> {
        let (idx, mask) = self.locate(index)?;
        let byte = self.levels[0][idx];
        if byte & mask == 0 {
            warn!(resource = %self.resource, index, "release of a free bit");
            return Ok(false);
        }
        self.store_leaf(store, idx, byte & !mask)?;
        debug!(resource = %self.resource, index, "released");
        Ok(true)
    }

    /// Reads the persisted bit directly, bypassing the tree.
    pub fn is_free<M: Medium>(&self, store: &mut BlockStore<M>, index: u64) -> FsResult<bool> {
        let (idx, mask) = self.locate(index)?;
        let byte = store.read_at(self.base + idx as u64, 1)?;
        Ok(byte[0] & mask == 0)
    }

    /// Number of set bits in the persisted bytes.
    pub fn count_allocated<M: Medium>(&self, store: &mut BlockStore<M>) -> FsResult<u64> {
        let bytes = store.read_at(self.base, self.levels[0].len())?;
        Ok(bytes.iter().map(|b| u64::from(b.count_ones())).sum())
    }

    fn locate(&self, index: u64) -> FsResult<(usize, u8)> {
        if index >= self.bits {
            return Err(FsError::invalid(format!(
                "{} index {index} is outside a bitmap of {}",
                self.resource, self.bits
            )));
        }
        let idx = usize::try_from(index / 8)
            .map_err(|_| FsError::invalid("bitmap index exceeds addressable size"))?;
        Ok((idx, 0x80 >> (index % 8)))
    }

    /// Writes one leaf through to the store, then recomputes its ancestors.
    fn store_leaf<M: Medium>(
        &mut self,
        store: &mut BlockStore<M>,
        idx: usize,
        value: u8,
    ) -> FsResult<()> {
        self.levels[0][idx] = value;
        let persisted = if idx + 1 == self.levels[0].len() {
            value & !padding_mask(self.bits)
        } else {
            value
        };
        store.write_at(self.base + idx as u64, &[persisted])?;

        let mut child = idx;
        for level in 1..self.levels.len() {
            let parent = child / 2;
            let below = &self.levels[level - 1];
            let left = below[parent * 2];
            let joined = below.get(parent * 2 + 1).map_or(left, |right| left & right);
            self.levels[level][parent] = joined;
            child = parent;
        }
        Ok(())
    }
}

/// Low bits of the final byte that do not map to any index.
fn padding_mask(bits: u64) -> u8 {
    match bits % 8 {
        0 => 0,
        used => FULL >> used,
    }
}
