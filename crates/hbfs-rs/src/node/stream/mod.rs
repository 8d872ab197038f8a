//! Byte stream over an inode's block chain.
//!
//! Blocks are addressed through 11 direct slots, then one, two and three
//! levels of 256-pointer indirect blocks. Intermediate blocks are allocated
//! only when a data block beneath them is, and every pointer is persisted
//! the moment it is written.
//!
//! Reclaiming is positional: when a data block is released, its container
//! is released too if the block sat at index 0 of it, and so on upward as
//! long as each released container itself sat at index 0. Since shrinking
//! always releases the last block first, a container whose index 0 goes is
//! already empty.


pub mod mapper;

use tracing::debug;

use crate::config::{BLOCK_SIZE, POINTERS_PER_BLOCK};
use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::layout::codec::WORD;
use crate::node::inode::Inode;
use crate::storage::medium::Medium;

use self::mapper::{BlockPath, locate};

pub struct FileStream {
    inode: Inode,
    position: u64,
    /// Last resolved `(logical block, physical offset)`.
    cached: Option<(u64, u64)>,
}

impl FileStream {
    /// Allocates a fresh inode and opens an empty stream over it.
    pub fn create<M: Medium>(disk: &mut Disk<M>) -> FsResult<Self> {
        Ok(Self::from_inode(Inode::allocate(disk)?))
    }

    pub fn open<M: Medium>(disk: &mut Disk<M>, number: u64) -> FsResult<Self> {
        Ok(Self::from_inode(Inode::open(disk, number)?))
    }

    #[must_use]
    pub const fn from_inode(inode: Inode) -> Self {
        Self {
            inode,
            position: 0,
            cached: None,
        }
    }

    #[must_use]
    pub const fn inode(&self) -> &Inode {
        &self.inode
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.inode.size()
    }

    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Moves the cursor. A position past the end grows the file to it.
    pub fn seek<M: Medium>(&mut self, disk: &mut Disk<M>, position: i64) -> FsResult<()> {
        let position = u64::try_from(position)
            .map_err(|_| FsError::invalid(format!("cannot seek to {position}")))?;
        if position > self.size() {
            self.resize(disk, position)?;
        }
        self.position = position;
        Ok(())
    }

    /// Reads up to `len` bytes from the cursor; `len == 0` reads to the end.
    pub fn read<M: Medium>(&mut self, disk: &mut Disk<M>, len: u64) -> FsResult<Vec<u8>> {
        let remaining = self.size().saturating_sub(self.position);
        let len = if len == 0 { remaining } else { len.min(remaining) };
        let mut out = Vec::with_capacity(usize::try_from(len).unwrap_or(0));

        let mut left = len;
        while left > 0 {
            let (block, within, chunk) = self.split(left);
            let base = self.block_at(disk, block)?;
            out.extend(disk.read_bytes(base + within, chunk_len(chunk)?)?);
            self.position += chunk;
            left -= chunk;
        }
        Ok(out)
    }

    /// Writes `content` at the cursor, growing the file as needed. With
    /// `truncate` the cursor rewinds to 0 and the file is resized to exactly
    /// `content.len()` first.
    ///
    /// # Errors
    /// Returns `CapacityExhausted` if the disk fills up; blocks allocated
    /// before that point stay allocated.
    pub fn write<M: Medium>(
        &mut self,
        disk: &mut Disk<M>,
        content: &[u8],
        truncate: bool,
    ) -> FsResult<()> {
        let len = content.len() as u64;
        if truncate {
            self.position = 0;
            self.resize(disk, len)?;
        } else if self.position + len > self.size() {
            self.resize(disk, self.position + len)?;
        }

        let mut written = 0usize;
        while written < content.len() {
            let (block, within, chunk) = self.split((content.len() - written) as u64);
            let base = self.block_at(disk, block)?;
            let end = written + chunk_len(chunk)?;
            disk.write_bytes(base + within, &content[written..end])?;
            self.position += chunk;
            written = end;
        }

        self.inode.touch();
        self.inode.save(disk)
    }

    /// Grows or shrinks the file to `target` bytes, one block at a time.
    ///
    /// Growth persists the size after every allocated block so a failure
    /// leaves the inode describing exactly the blocks it owns. Shrinking
    /// releases from the last block down and zeroes the unused tail of the
    /// last kept block.
    ///
    /// # Errors
    /// Returns `CapacityExhausted` or `InvalidOperation` (past the largest
    /// addressable file) part way through growth.
    pub fn resize<M: Medium>(&mut self, disk: &mut Disk<M>, target: u64) -> FsResult<()> {
        let size = self.size();
        let have = size.div_ceil(BLOCK_SIZE);
        let want = target.div_ceil(BLOCK_SIZE);

        if target > size {
            for block in have..want {
                self.resolve_or_allocate(disk, block)?;
                self.inode.set_size(target.min((block + 1) * BLOCK_SIZE));
                self.inode.touch();
                self.inode.save(disk)?;
            }
        } else if target < size {
            self.cached = None;
            for block in (want..have).rev() {
                self.release_block(disk, block)?;
                self.inode.set_size(block * BLOCK_SIZE);
                self.inode.save(disk)?;
            }
            let tail = target % BLOCK_SIZE;
            if tail != 0 {
                let base = self.block_at(disk, want - 1)?;
                disk.write_bytes(base + tail, &vec![0u8; chunk_len(BLOCK_SIZE - tail)?])?;
            }
        }

        debug!(inode = self.inode.number(), from = size, to = target, "resized");
        self.inode.set_size(target);
        self.inode.touch();
        self.inode.save(disk)
    }

    /// Physical offset of logical `block`, or `None` if it has no pointer.
    pub fn resolve<M: Medium>(&self, disk: &mut Disk<M>, block: u64) -> FsResult<Option<u64>> {
        let path = locate(block)?;
        let mut ptr = self.inode.pointer(disk, path.slot)?;
        for &index in path.indices() {
            if ptr == 0 {
                return Ok(None);
            }
            ptr = disk.read_word(entry_offset(ptr, index))?;
        }
        Ok((ptr != 0).then_some(ptr))
    }

    /// Like `resolve`, but allocates the data block and any missing
    /// indirect block on the way. If an allocation fails, the blocks this
    /// call already claimed are released and their pointers cleared.
    ///
    /// # Errors
    /// Returns `CapacityExhausted` when the disk is full.
    pub fn resolve_or_allocate<M: Medium>(
        &mut self,
        disk: &mut Disk<M>,
        block: u64,
    ) -> FsResult<u64> {
        let path = locate(block)?;
        let mut claimed = Vec::new();
        match self.descend_allocating(disk, &path, &mut claimed) {
            Ok(ptr) => Ok(ptr),
            Err(err) => {
                for &(entry, ptr) in claimed.iter().rev() {
                    let number = disk.geometry().block_number(ptr)?;
                    disk.release_block(number)?;
                    disk.write_word(entry, 0)?;
                }
                debug!(
                    inode = self.inode.number(),
                    block,
                    dropped = claimed.len(),
                    "allocation failed"
                );
                Err(err)
            }
        }
    }

    /// Releases the data block at logical `block` and, by the positional
    /// rule, the indirect blocks that held it. Clears every pointer it frees.
    pub fn release_block<M: Medium>(&mut self, disk: &mut Disk<M>, block: u64) -> FsResult<()> {
        let path = locate(block)?;
        let chain = self.chain(disk, &path)?;
        if chain.len() != path.indices().len() + 1 {
            debug!(inode = self.inode.number(), block, "release of an unmapped block");
            return Ok(());
        }

        for (level, &(entry, ptr)) in chain.iter().enumerate().rev() {
            let number = disk.geometry().block_number(ptr)?;
            disk.release_block(number)?;
            disk.write_word(entry, 0)?;
            if level == 0 || path.indices()[level - 1] != 0 {
                break;
            }
        }
        if self.cached.is_some_and(|(cached, _)| cached == block) {
            self.cached = None;
        }
        Ok(())
    }

    /// Walks `path`, filling every zero pointer with a new block. Each
    /// `(entry offset, pointer)` it writes is pushed onto `claimed`.
    fn descend_allocating<M: Medium>(
        &mut self,
        disk: &mut Disk<M>,
        path: &BlockPath,
        claimed: &mut Vec<(u64, u64)>,
    ) -> FsResult<u64> {
        let mut entry = self.inode.slot_offset(path.slot);
        let mut ptr = self.inode.pointer(disk, path.slot)?;
        if ptr == 0 {
            ptr = new_block(disk)?;
            self.inode.set_pointer(disk, path.slot, ptr)?;
            claimed.push((entry, ptr));
        }
        for &index in path.indices() {
            entry = entry_offset(ptr, index);
            let mut child = disk.read_word(entry)?;
            if child == 0 {
                child = new_block(disk)?;
                disk.write_word(entry, child)?;
                claimed.push((entry, child));
            }
            ptr = child;
        }
        Ok(ptr)
    }

    /// `(entry offset, pointer)` for every non-zero pointer along `path`,
    /// from the inode slot down to the data block.
    fn chain<M: Medium>(&self, disk: &mut Disk<M>, path: &BlockPath) -> FsResult<Vec<(u64, u64)>> {
        let mut chain = Vec::with_capacity(path.indices().len() + 1);
        let mut entry = self.inode.slot_offset(path.slot);
        let mut ptr = disk.read_word(entry)?;
        for &index in path.indices() {
            if ptr == 0 {
                return Ok(chain);
            }
            chain.push((entry, ptr));
            entry = entry_offset(ptr, index);
            ptr = disk.read_word(entry)?;
        }
        if ptr != 0 {
            chain.push((entry, ptr));
        }
        Ok(chain)
    }

    fn block_at<M: Medium>(&mut self, disk: &mut Disk<M>, block: u64) -> FsResult<u64> {
        if let Some((_, base)) = self.cached.filter(|(cached, _)| *cached == block) {
            return Ok(base);
        }
        let base = self.resolve(disk, block)?.ok_or_else(|| {
            FsError::corrupt(format!(
                "block {block} of inode {} has no pointer",
                self.inode.number()
            ))
        })?;
        self.cached = Some((block, base));
        Ok(base)
    }

    /// `(logical block, offset within it, bytes to move)` for the next step
    /// from the cursor with `left` bytes outstanding.
    const fn split(&self, left: u64) -> (u64, u64, u64) {
        let block = self.position / BLOCK_SIZE;
        let within = self.position % BLOCK_SIZE;
        let room = BLOCK_SIZE - within;
        (block, within, if left < room { left } else { room })
    }
}

fn new_block<M: Medium>(disk: &mut Disk<M>) -> FsResult<u64> {
    let block = disk.allocate_block()?;
    Ok(disk.geometry().block_offset(block))
}

fn entry_offset(container: u64, index: u64) -> u64 {
    debug_assert!(index < POINTERS_PER_BLOCK);
    container + index * WORD as u64
}

fn chunk_len(chunk: u64) -> FsResult<usize> {
    usize::try_from(chunk).map_err(|_| FsError::invalid("chunk exceeds addressable size"))
}
