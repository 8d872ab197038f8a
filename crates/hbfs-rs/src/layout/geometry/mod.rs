
use crate::config::{
    BLOCK_SIZE, DESCRIPTOR_SIZE, DiskConfig, INODE_SIZE, NAME_FIELD_OFFSET, NAME_FIELD_SIZE,
};
use crate::error::{FsError, FsResult};
use crate::layout::codec::{WORD, decode_word, encode_word};

/// Byte offsets of every region of an image.
///
/// ```text
/// | descriptor | name | block bitmap | inode bitmap | inode table | data table |
/// 0            32     288
/// ```
///
/// Offsets depend only on the two totals and never change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub total_blocks: u64,
    pub total_inodes: u64,
    pub block_bitmap: u64,
    pub inode_bitmap: u64,
    pub inode_table: u64,
    pub data_table: u64,
}

impl Geometry {
    #[must_use]
    pub const fn new(config: DiskConfig) -> Self {
        let block_bitmap = NAME_FIELD_OFFSET + NAME_FIELD_SIZE;
        let inode_bitmap = block_bitmap + config.total_blocks.div_ceil(8);
        let inode_table = inode_bitmap + config.total_inodes.div_ceil(8);
        let data_table = inode_table + config.total_inodes * INODE_SIZE;
        Self {
            total_blocks: config.total_blocks,
            total_inodes: config.total_inodes,
            block_bitmap,
            inode_bitmap,
            inode_table,
            data_table,
        }
    }

    #[must_use]
    pub const fn block_bitmap_len(&self) -> u64 {
        self.total_blocks.div_ceil(8)
    }

    #[must_use]
    pub const fn inode_bitmap_len(&self) -> u64 {
        self.total_inodes.div_ceil(8)
    }

    /// Byte length of a fully materialised image.
    #[must_use]
    pub const fn image_len(&self) -> u64 {
        self.data_table + self.total_blocks * BLOCK_SIZE
    }

    #[must_use]
    pub const fn block_offset(&self, block: u64) -> u64 {
        self.data_table + block * BLOCK_SIZE
    }

    pub fn block_number(&self, offset: u64) -> FsResult<u64> {
        region_index(offset, self.data_table, BLOCK_SIZE, self.total_blocks)
            .ok_or_else(|| FsError::corrupt(format!("{offset} is not a data block offset")))
    }

    #[must_use]
    pub const fn inode_offset(&self, inode: u64) -> u64 {
        self.inode_table + inode * INODE_SIZE
    }

    pub fn inode_number(&self, offset: u64) -> FsResult<u64> {
        region_index(offset, self.inode_table, INODE_SIZE, self.total_inodes)
            .ok_or_else(|| FsError::corrupt(format!("{offset} is not an inode offset")))
    }
}

fn region_index(offset: u64, base: u64, stride: u64, count: u64) -> Option<u64> {
    let rel = offset.checked_sub(base)?;
    if rel % stride != 0 {
        return None;
    }
    let index = rel / stride;
    (index < count).then_some(index)
}

/// The 32-byte count table at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub total_blocks: u64,
    pub total_inodes: u64,
    pub free_blocks: u64,
    pub free_inodes: u64,
}

impl Descriptor {
    /// A descriptor for a freshly formatted disk: everything free.
    #[must_use]
    pub const fn fresh(config: DiskConfig) -> Self {
        Self {
            total_blocks: config.total_blocks,
            total_inodes: config.total_inodes,
            free_blocks: config.total_blocks,
            free_inodes: config.total_inodes,
        }
    }

    #[must_use]
    pub const fn config(&self) -> DiskConfig {
        DiskConfig::new(self.total_blocks, self.total_inodes)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE as usize] {
        let mut buf = [0u8; DESCRIPTOR_SIZE as usize];
        let words = [
            self.total_blocks,
            self.total_inodes,
            self.free_blocks,
            self.free_inodes,
        ];
        for (chunk, word) in buf.chunks_exact_mut(WORD).zip(words) {
            chunk.copy_from_slice(&encode_word(word));
        }
        buf
    }

    /// # Errors
    /// Returns `Corrupt` for short buffers, negative counts, or free counts
    /// larger than their totals.
    pub fn from_bytes(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < DESCRIPTOR_SIZE as usize {
            return Err(FsError::corrupt("descriptor table is truncated"));
        }
        let descriptor = Self {
            total_blocks: decode_word(&buf[0..8])?,
            total_inodes: decode_word(&buf[8..16])?,
            free_blocks: decode_word(&buf[16..24])?,
            free_inodes: decode_word(&buf[24..32])?,
        };
        if descriptor.free_blocks > descriptor.total_blocks
            || descriptor.free_inodes > descriptor.total_inodes
        {
            return Err(FsError::corrupt(format!(
                "free counts exceed totals: {descriptor:?}"
            )));
        }
        descriptor
            .config()
            .validate()
            .map_err(|err| FsError::corrupt(err.to_string()))?;
        Ok(descriptor)
    }
}
