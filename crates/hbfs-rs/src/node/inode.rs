//! The 128-byte inode record.
//!
//! ```text
//! 0      8       16                      104       112     120     128
//! | size | mtime | 11 direct pointers    | single  | double | triple |
//! ```
//!
//! Size and mtime are cached in memory and written by `save`. Pointer slots
//! are never cached: every read goes to the record and every write lands
//! immediately.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::DIRECT_POINTERS;
use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::layout::codec::WORD;
use crate::storage::medium::Medium;

const SIZE_FIELD: u64 = 0;
const MTIME_FIELD: u64 = 8;
const DIRECT_FIELD: u64 = 16;
const SINGLE_FIELD: u64 = DIRECT_FIELD + DIRECT_POINTERS * WORD as u64;
const DOUBLE_FIELD: u64 = SINGLE_FIELD + WORD as u64;
const TRIPLE_FIELD: u64 = DOUBLE_FIELD + WORD as u64;

/// A pointer slot inside the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Direct(u64),
    Single,
    Double,
    Triple,
}

impl Slot {
    /// Byte offset of the slot inside the record.
    const fn field(self) -> u64 {
        match self {
            Self::Direct(i) => DIRECT_FIELD + i * WORD as u64,
            Self::Single => SINGLE_FIELD,
            Self::Double => DOUBLE_FIELD,
            Self::Triple => TRIPLE_FIELD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    number: u64,
    offset: u64,
    size: u64,
    modified: u64,
}

impl Inode {
    /// Claims a zeroed record, stamps it with the current time and persists it.
    pub fn allocate<M: Medium>(disk: &mut Disk<M>) -> FsResult<Self> {
        let number = disk.allocate_inode()?;
        let mut inode = Self {
            number,
            offset: disk.geometry().inode_offset(number),
            size: 0,
            modified: now_millis(),
        };
        inode.save(disk)?;
        Ok(inode)
    }

    /// Reads size and mtime of an allocated record.
    pub fn open<M: Medium>(disk: &mut Disk<M>, number: u64) -> FsResult<Self> {
        if number >= disk.geometry().total_inodes {
            return Err(FsError::corrupt(format!("inode {number} is past the table")));
        }
        if disk.is_inode_free(number)? {
            return Err(FsError::NotFound(format!("inode {number}")));
        }
        let offset = disk.geometry().inode_offset(number);
        Ok(Self {
            number,
            offset,
            size: disk.read_word(offset + SIZE_FIELD)?,
            modified: disk.read_word(offset + MTIME_FIELD)?,
        })
    }

    /// Persists size and mtime; pointer slots are never touched here.
    pub fn save<M: Medium>(&self, disk: &mut Disk<M>) -> FsResult<()> {
        disk.write_word(self.offset + SIZE_FIELD, self.size)?;
        disk.write_word(self.offset + MTIME_FIELD, self.modified)
    }

    /// Frees the inode bit. Returns `false` if it was already free.
    pub fn release<M: Medium>(disk: &mut Disk<M>, number: u64) -> FsResult<bool> {
        disk.release_inode(number)
    }

    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Absolute byte offset of the record, as stored in directory entries.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time in milliseconds since the Unix epoch.
    #[must_use]
    pub const fn modified(&self) -> u64 {
        self.modified
    }

    pub const fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn touch(&mut self) {
        self.modified = now_millis();
    }

    /// Absolute offset of a pointer slot.
    #[must_use]
    pub const fn slot_offset(&self, slot: Slot) -> u64 {
        self.offset + slot.field()
    }

    pub fn pointer<M: Medium>(&self, disk: &mut Disk<M>, slot: Slot) -> FsResult<u64> {
        disk.read_word(self.slot_offset(slot))
    }

    pub fn set_pointer<M: Medium>(&self, disk: &mut Disk<M>, slot: Slot, value: u64) -> FsResult<()> {
        disk.write_word(self.slot_offset(slot), value)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
