//! One open image: descriptor counters, disk name and both allocation bitmaps.
//!
//! Every counter change is written through to the descriptor table at the
//! moment it happens; nothing is cached for a later flush.


use tracing::{debug, info};

use crate::config::{
    BLOCK_SIZE, DESCRIPTOR_SIZE, DiskConfig, INODE_SIZE, MAX_NAME_LEN, NAME_FIELD_OFFSET,
    NAME_FIELD_SIZE, ROOT_INODE, validate_name,
};
use crate::error::{FsError, FsResult, Resource};
use crate::layout::bitmap::Bitmap;
use crate::layout::codec::{WORD, decode_word, encode_word};
use crate::layout::geometry::{Descriptor, Geometry};
use crate::node::inode::Inode;
use crate::storage::medium::{Medium, MemoryMedium};
use crate::storage::store::BlockStore;

/// Capacity summary of one disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskReport {
    pub name: String,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
}

/// Set-bit counts of both bitmaps as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audit {
    pub used_blocks: u64,
    pub used_inodes: u64,
}

pub struct Disk<M: Medium> {
    store: BlockStore<M>,
    geometry: Geometry,
    descriptor: Descriptor,
    name: String,
    blocks: Bitmap,
    inodes: Bitmap,
}

impl<M: Medium> Disk<M> {
    /// Formats `medium` and allocates inode 0 as the empty root directory.
    ///
    /// # Errors
    /// Fails for an invalid capacity or name, or if the medium fails.
    pub fn create(medium: M, config: DiskConfig, name: &str) -> FsResult<Self> {
        config.validate()?;
        validate_name(name)?;

        let mut store = BlockStore::new(medium);
        let geometry = Geometry::new(config);
        let descriptor = Descriptor::fresh(config);
        store.write_at(0, &descriptor.to_bytes())?;
        store.write_at(NAME_FIELD_OFFSET, &name_field(name))?;
        let bitmaps_len = geometry.block_bitmap_len() + geometry.inode_bitmap_len();
        store.write_at(geometry.block_bitmap, &vec![0u8; to_usize(bitmaps_len)?])?;

        let blocks = Bitmap::load(
            &mut store,
            Resource::Blocks,
            geometry.block_bitmap,
            config.total_blocks,
        )?;
        let inodes = Bitmap::load(
            &mut store,
            Resource::Inodes,
            geometry.inode_bitmap,
            config.total_inodes,
        )?;

        let mut disk = Self {
            store,
            geometry,
            descriptor,
            name: name.to_string(),
            blocks,
            inodes,
        };
        let root = Inode::allocate(&mut disk)?;
        if root.number() != ROOT_INODE {
            return Err(FsError::corrupt("root directory did not land on inode 0"));
        }
        info!(
            disk = %disk.name,
            blocks = config.total_blocks,
            inodes = config.total_inodes,
            "created disk"
        );
        Ok(disk)
    }

    /// Opens a previously formatted image.
    ///
    /// # Errors
    /// Returns `Corrupt` if the descriptor, the name or the root inode bit
    /// is not valid, or if a free counter disagrees with its bitmap.
    pub fn open(medium: M) -> FsResult<Self> {
        if medium.len() < DESCRIPTOR_SIZE + NAME_FIELD_SIZE {
            return Err(FsError::corrupt(format!(
                "image of {} bytes is shorter than its header",
                medium.len()
            )));
        }
        let mut store = BlockStore::new(medium);
        let descriptor = Descriptor::from_bytes(&store.read_at(0, DESCRIPTOR_SIZE as usize)?)?;
        let field = store.read_at(NAME_FIELD_OFFSET, NAME_FIELD_SIZE as usize)?;
        let name_len = usize::from(field[0]);
        let name = std::str::from_utf8(&field[1..=name_len])
            .map_err(|_| FsError::corrupt("disk name is not UTF-8"))?
            .to_string();

        let geometry = Geometry::new(descriptor.config());
        let blocks = Bitmap::load(
            &mut store,
            Resource::Blocks,
            geometry.block_bitmap,
            geometry.total_blocks,
        )?;
        let inodes = Bitmap::load(
            &mut store,
            Resource::Inodes,
            geometry.inode_bitmap,
            geometry.total_inodes,
        )?;
        if inodes.is_free(&mut store, ROOT_INODE)? {
            return Err(FsError::corrupt("root inode is not allocated"));
        }
        check_counter(
            Resource::Blocks,
            descriptor.total_blocks - descriptor.free_blocks,
            blocks.count_allocated(&mut store)?,
        )?;
        check_counter(
            Resource::Inodes,
            descriptor.total_inodes - descriptor.free_inodes,
            inodes.count_allocated(&mut store)?,
        )?;

        info!(disk = %name, "opened disk");
        Ok(Self {
            store,
            geometry,
            descriptor,
            name,
            blocks,
            inodes,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[must_use]
    pub const fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn report(&self) -> DiskReport {
        DiskReport {
            name: self.name.clone(),
            total_blocks: self.descriptor.total_blocks,
            free_blocks: self.descriptor.free_blocks,
            total_inodes: self.descriptor.total_inodes,
            free_inodes: self.descriptor.free_inodes,
        }
    }

    pub fn rename(&mut self, new_name: &str) -> FsResult<()> {
        validate_name(new_name)?;
        self.store
            .write_at(NAME_FIELD_OFFSET, &name_field(new_name))?;
        info!(from = %self.name, to = %new_name, "renamed disk");
        self.name = new_name.to_string();
        Ok(())
    }

    /// Claims the lowest free data block and zero-fills it.
    pub fn allocate_block(&mut self) -> FsResult<u64> {
        let block = self.blocks.allocate_first_free(&mut self.store)?;
        self.store.write_at(
            self.geometry.block_offset(block),
            &[0u8; BLOCK_SIZE as usize],
        )?;
        self.descriptor.free_blocks = taken(self.descriptor.free_blocks, Resource::Blocks)?;
        self.save_descriptor()?;
        Ok(block)
    }

    /// # Errors
    /// Returns `InvalidOperation` if the block is already free.
    pub fn release_block(&mut self, block: u64) -> FsResult<()> {
        if !self.blocks.release(&mut self.store, block)? {
            return Err(FsError::invalid(format!(
                "data block {block} is already free"
            )));
        }
        self.descriptor.free_blocks += 1;
        self.save_descriptor()
    }

    /// Claims the lowest free inode and zero-fills its record.
    pub fn allocate_inode(&mut self) -> FsResult<u64> {
        let inode = self.inodes.allocate_first_free(&mut self.store)?;
        self.store.write_at(
            self.geometry.inode_offset(inode),
            &[0u8; INODE_SIZE as usize],
        )?;
        self.descriptor.free_inodes = taken(self.descriptor.free_inodes, Resource::Inodes)?;
        self.save_descriptor()?;
        Ok(inode)
    }

    /// Frees an inode bit. The record itself is left as is. Returns whether
    /// the bit actually changed.
    pub fn release_inode(&mut self, inode: u64) -> FsResult<bool> {
        if inode == ROOT_INODE {
            return Err(FsError::invalid("the root inode is never released"));
        }
        let changed = self.inodes.release(&mut self.store, inode)?;
        if changed {
            self.descriptor.free_inodes += 1;
            self.save_descriptor()?;
        }
        Ok(changed)
    }

    pub fn is_block_free(&mut self, block: u64) -> FsResult<bool> {
        self.blocks.is_free(&mut self.store, block)
    }

    pub fn is_inode_free(&mut self, inode: u64) -> FsResult<bool> {
        self.inodes.is_free(&mut self.store, inode)
    }

    /// Counts set bits in both bitmaps.
    pub fn audit(&mut self) -> FsResult<Audit> {
        Ok(Audit {
            used_blocks: self.blocks.count_allocated(&mut self.store)?,
            used_inodes: self.inodes.count_allocated(&mut self.store)?,
        })
    }

    pub fn read_word(&mut self, off: u64) -> FsResult<u64> {
        decode_word(&self.store.read_at(off, WORD)?)
    }

    pub fn write_word(&mut self, off: u64, value: u64) -> FsResult<()> {
        self.store.write_at(off, &encode_word(value))?;
        Ok(())
    }

    pub fn read_bytes(&mut self, off: u64, len: usize) -> FsResult<Vec<u8>> {
        Ok(self.store.read_at(off, len)?)
    }

    pub fn write_bytes(&mut self, off: u64, data: &[u8]) -> FsResult<()> {
        self.store.write_at(off, data)?;
        Ok(())
    }

    pub fn flush(&mut self) -> FsResult<()> {
        self.store.flush()?;
        debug!(disk = %self.name, len = self.store.len(), "flushed");
        Ok(())
    }

    #[must_use]
    pub const fn medium(&self) -> &M {
        self.store.medium()
    }

    /// Hands the medium back, e.g. to persist an in-memory image.
    #[must_use]
    pub fn into_medium(self) -> M {
        self.store.into_medium()
    }

    fn save_descriptor(&mut self) -> FsResult<()> {
        self.store.write_at(0, &self.descriptor.to_bytes())?;
        Ok(())
    }
}

impl Disk<MemoryMedium> {
    /// Opens an image held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> FsResult<Self> {
        Self::open(MemoryMedium::from_bytes(bytes))
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.into_medium().into_bytes()
    }
}

fn name_field(name: &str) -> Vec<u8> {
    let bytes = name.as_bytes();
    let mut field = vec![0u8; NAME_FIELD_SIZE as usize];
    let len = bytes.len().min(MAX_NAME_LEN);
    field[0] = u8::try_from(len).unwrap_or(u8::MAX);
    field[1..=len].copy_from_slice(&bytes[..len]);
    field
}

fn check_counter(resource: Resource, described: u64, marked: u64) -> FsResult<()> {
    if described == marked {
        return Ok(());
    }
    Err(FsError::corrupt(format!(
        "descriptor says {described} {resource} in use, bitmap marks {marked}"
    )))
}

fn taken(free: u64, resource: Resource) -> FsResult<u64> {
    free.checked_sub(1)
        .ok_or_else(|| FsError::corrupt(format!("free {resource} counter is already 0")))
}

fn to_usize(len: u64) -> FsResult<usize> {
    usize::try_from(len).map_err(|_| FsError::invalid("length exceeds addressable size"))
}
