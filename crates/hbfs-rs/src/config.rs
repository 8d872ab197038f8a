//! On-disk constants and disk sizing.

use crate::error::{FsError, FsResult};

/// BLOCK_SIZE is the byte size of one data block.
pub const BLOCK_SIZE: u64 = 2048;
/// INODE_SIZE is the byte size of one inode record.
pub const INODE_SIZE: u64 = 128;
/// DESCRIPTOR_SIZE is the byte size of the count table at offset 0.
pub const DESCRIPTOR_SIZE: u64 = 32;
/// NAME_FIELD_OFFSET is where the disk name length byte lives.
pub const NAME_FIELD_OFFSET: u64 = DESCRIPTOR_SIZE;
/// NAME_FIELD_SIZE covers the length byte plus the 255 name bytes.
pub const NAME_FIELD_SIZE: u64 = 1 + MAX_NAME_LEN as u64;
/// MAX_NAME_LEN is the longest encoded name for disks and entries.
pub const MAX_NAME_LEN: usize = 255;
/// DIRECT_POINTERS is the number of direct block slots in an inode.
pub const DIRECT_POINTERS: u64 = 11;
/// POINTERS_PER_BLOCK is how many 8-byte pointers an indirect block holds.
pub const POINTERS_PER_BLOCK: u64 = BLOCK_SIZE / 8;
/// ROOT_INODE is the inode number reserved for the root directory.
pub const ROOT_INODE: u64 = 0;
/// PATH_SEPARATOR may not appear inside names.
pub const PATH_SEPARATOR: char = '/';
/// IMAGE_EXTENSION is the file suffix of persisted disk images.
pub const IMAGE_EXTENSION: &str = "hbdk";

/// Capacity of a disk, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskConfig {
    pub total_blocks: u64,
    pub total_inodes: u64,
}

impl DiskConfig {
    #[must_use]
    pub const fn new(total_blocks: u64, total_inodes: u64) -> Self {
        Self {
            total_blocks,
            total_inodes,
        }
    }

    /// `from_megabytes` sizes a disk the way the web front end did: 64 blocks
    /// and 4 inodes per megabyte, each rounded up to a multiple of 8.
    pub fn from_megabytes(size_mb: f64) -> FsResult<Self> {
        if !size_mb.is_finite() || size_mb <= 0.0 {
            return Err(FsError::invalid(format!(
                "disk size must be positive, got {size_mb}"
            )));
        }
        let blocks = (size_mb * 64.0).ceil() as u64 * 8;
        let inodes = (size_mb * 4.0).ceil() as u64 * 8;
        Ok(Self::new(blocks, inodes))
    }

    pub fn validate(&self) -> FsResult<()> {
        if self.total_blocks == 0 {
            return Err(FsError::invalid("a disk needs at least one data block"));
        }
        if self.total_inodes == 0 {
            return Err(FsError::invalid("a disk needs at least one inode"));
        }
        let data = self
            .total_blocks
            .checked_mul(BLOCK_SIZE)
            .and_then(|d| self.total_inodes.checked_mul(INODE_SIZE)?.checked_add(d));
        match data {
            Some(bytes) if bytes < i64::MAX as u64 / 2 => Ok(()),
            _ => Err(FsError::invalid("disk capacity exceeds addressable size")),
        }
    }
}

/// `validate_name` enforces the naming rules shared by disks and entries.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::InvalidName(name.to_string(), "name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::InvalidName(
            name.to_string(),
            "name is longer than 255 bytes",
        ));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(FsError::InvalidName(
            name.to_string(),
            "name contains a path separator",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn megabyte_sizing_rounds_to_multiples_of_eight() {
        let cfg = DiskConfig::from_megabytes(1.0).expect("1 MB");
        assert_eq!(cfg, DiskConfig::new(512, 32));

        let cfg = DiskConfig::from_megabytes(0.01).expect("tiny");
        assert_eq!(cfg.total_blocks, 8);
        assert_eq!(cfg.total_inodes, 8);

        assert!(DiskConfig::from_megabytes(0.0).is_err());
        assert!(DiskConfig::from_megabytes(f64::NAN).is_err());
    }

    #[test]
    fn validate_rejects_empty_capacity() {
        assert!(DiskConfig::new(0, 8).validate().is_err());
        assert!(DiskConfig::new(8, 0).validate().is_err());
        assert!(DiskConfig::new(u64::MAX, 8).validate().is_err());
        assert!(DiskConfig::new(500, 8).validate().is_ok());
    }

    #[test]
    fn name_rules() {
        assert!(validate_name("notes.txt").is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(matches!(
            validate_name(""),
            Err(FsError::InvalidName(_, _))
        ));
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("/lead").is_err());
        // multibyte characters count by encoded length
        assert!(validate_name(&"é".repeat(128)).is_err());
    }

    #[test]
    fn pointer_fan_out_matches_block_size() {
        assert_eq!(POINTERS_PER_BLOCK, 256);
        assert_eq!(NAME_FIELD_OFFSET + NAME_FIELD_SIZE, 288);
    }
}
