//! Directories are file streams whose content is a list of entries.
//!
//! Each entry is encoded as
//!
//! ```text
//! | inode offset (8, i64 LE) | type (1) | name len (1) | name (UTF-8) |
//! ```
//!
//! in insertion order. The whole list is rewritten on every change.
//! Every directory except the root starts with `..` and `.`.


use tracing::{debug, info};

use crate::config::{MAX_NAME_LEN, validate_name};
use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::layout::codec::{WORD, decode_word, encode_word};
use crate::layout::geometry::Geometry;
use crate::node::NodeKind;
use crate::node::inode::Inode;
use crate::node::stream::FileStream;
use crate::storage::medium::Medium;

pub const SELF_ENTRY: &str = ".";
pub const PARENT_ENTRY: &str = "..";

const HEADER_LEN: usize = WORD + 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u64,
    pub kind: NodeKind,
    pub name: String,
}

impl DirEntry {
    #[must_use]
    pub fn is_dot(&self) -> bool {
        is_dot(&self.name)
    }
}

pub struct Directory {
    stream: FileStream,
    entries: Vec<DirEntry>,
}

impl Directory {
    /// Opens inode `number` and parses its entry list.
    pub fn open<M: Medium>(disk: &mut Disk<M>, number: u64) -> FsResult<Self> {
        let mut stream = FileStream::open(disk, number)?;
        let entries = if stream.size() > 0 {
            let bytes = stream.read(disk, 0)?;
            decode_entries(&bytes, disk.geometry())?
        } else {
            Vec::new()
        };
        Ok(Self { stream, entries })
    }

    #[must_use]
    pub fn number(&self) -> u64 {
        self.stream.inode().number()
    }

    #[must_use]
    pub const fn stream(&self) -> &FileStream {
        &self.stream
    }

    #[must_use]
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Re-encodes every entry and replaces the stream content with it.
    pub fn save<M: Medium>(&mut self, disk: &mut Disk<M>) -> FsResult<()> {
        let bytes = encode_entries(&self.entries, disk.geometry());
        self.stream.write(disk, &bytes, true)
    }

    pub fn create_file<M: Medium>(&mut self, disk: &mut Disk<M>, name: &str) -> FsResult<u64> {
        self.check_new_name(name)?;
        let inode = Inode::allocate(disk)?;
        self.push(disk, inode.number(), NodeKind::File, name)?;
        debug!(dir = self.number(), name, inode = inode.number(), "created file");
        Ok(inode.number())
    }

    /// Creates a child directory holding `..` and `.`.
    pub fn create_directory<M: Medium>(&mut self, disk: &mut Disk<M>, name: &str) -> FsResult<u64> {
        self.check_new_name(name)?;
        let inode = Inode::allocate(disk)?;
        let number = inode.number();
        self.push(disk, number, NodeKind::Directory, name)?;

        let mut child = Self {
            stream: FileStream::from_inode(inode),
            entries: vec![
                DirEntry {
                    inode: self.number(),
                    kind: NodeKind::Directory,
                    name: PARENT_ENTRY.to_string(),
                },
                DirEntry {
                    inode: number,
                    kind: NodeKind::Directory,
                    name: SELF_ENTRY.to_string(),
                },
            ],
        };
        child.save(disk)?;
        debug!(dir = self.number(), name, inode = number, "created directory");
        Ok(number)
    }

    /// Renames an entry in place; the inode it points to is unchanged.
    pub fn rename<M: Medium>(&mut self, disk: &mut Disk<M>, old: &str, new: &str) -> FsResult<()> {
        reject_dot_target(old)?;
        let idx = self.position_of(old)?;
        if old == new {
            return Ok(());
        }
        self.check_new_name(new)?;
        self.entries[idx].name = new.to_string();
        self.save(disk)?;
        debug!(dir = self.number(), from = old, to = new, "renamed entry");
        Ok(())
    }

    /// Removes an entry. Files are truncated to zero and their inode freed.
    /// Directories require `recursive` and take their whole subtree along.
    ///
    /// # Errors
    /// Returns `InvalidOperation` for `.`/`..` or a directory without
    /// `recursive`, and `NotFound` for a missing name.
    pub fn delete<M: Medium>(
        &mut self,
        disk: &mut Disk<M>,
        name: &str,
        recursive: bool,
    ) -> FsResult<()> {
        reject_dot_target(name)?;
        let idx = self.position_of(name)?;
        let entry = self.entries[idx].clone();
        match entry.kind {
            NodeKind::File => remove_file(disk, entry.inode)?,
            NodeKind::Directory if !recursive => {
                return Err(FsError::invalid(format!(
                    "{name} is a directory; delete it recursively"
                )));
            }
            NodeKind::Directory => remove_tree(disk, entry.inode)?,
        }
        self.entries.remove(idx);
        self.save(disk)?;
        info!(dir = self.number(), name, recursive, "deleted entry");
        Ok(())
    }

    fn push<M: Medium>(
        &mut self,
        disk: &mut Disk<M>,
        inode: u64,
        kind: NodeKind,
        name: &str,
    ) -> FsResult<()> {
        self.entries.push(DirEntry {
            inode,
            kind,
            name: name.to_string(),
        });
        self.save(disk)
    }

    fn check_new_name(&self, name: &str) -> FsResult<()> {
        validate_name(name)?;
        if is_dot(name) {
            return Err(FsError::InvalidName(name.to_string(), "name is reserved"));
        }
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    fn position_of(&self, name: &str) -> FsResult<usize> {
        self.entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }
}

fn is_dot(name: &str) -> bool {
    name == SELF_ENTRY || name == PARENT_ENTRY
}

fn reject_dot_target(name: &str) -> FsResult<()> {
    if is_dot(name) {
        return Err(FsError::invalid(format!("{name:?} cannot be targeted")));
    }
    Ok(())
}

fn remove_file<M: Medium>(disk: &mut Disk<M>, number: u64) -> FsResult<()> {
    FileStream::open(disk, number)?.resize(disk, 0)?;
    Inode::release(disk, number)?;
    Ok(())
}

/// Depth-first removal of a directory and everything beneath it.
fn remove_tree<M: Medium>(disk: &mut Disk<M>, number: u64) -> FsResult<()> {
    let Directory {
        mut stream,
        entries,
    } = Directory::open(disk, number)?;
    for entry in entries.iter().filter(|e| !e.is_dot()) {
        match entry.kind {
            NodeKind::File => remove_file(disk, entry.inode)?,
            NodeKind::Directory => remove_tree(disk, entry.inode)?,
        }
    }
    stream.resize(disk, 0)?;
    Inode::release(disk, number)?;
    Ok(())
}

fn encode_entries(entries: &[DirEntry], geometry: &Geometry) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.iter().map(|e| HEADER_LEN + e.name.len()).sum());
    for entry in entries {
        let name = &entry.name.as_bytes()[..entry.name.len().min(MAX_NAME_LEN)];
        out.extend_from_slice(&encode_word(geometry.inode_offset(entry.inode)));
        out.push(entry.kind.as_byte());
        out.push(u8::try_from(name.len()).unwrap_or(u8::MAX));
        out.extend_from_slice(name);
    }
    out
}

fn decode_entries(bytes: &[u8], geometry: &Geometry) -> FsResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < HEADER_LEN {
            return Err(FsError::corrupt("directory entry header is truncated"));
        }
        let inode = geometry.inode_number(decode_word(&rest[..WORD])?)?;
        let kind = NodeKind::from_byte(rest[WORD])?;
        let name_len = usize::from(rest[WORD + 1]);
        let name = rest
            .get(HEADER_LEN..HEADER_LEN + name_len)
            .ok_or_else(|| FsError::corrupt("directory entry name is truncated"))?;
        let name = std::str::from_utf8(name)
            .map_err(|_| FsError::corrupt("directory entry name is not UTF-8"))?;
        entries.push(DirEntry {
            inode,
            kind,
            name: name.to_string(),
        });
        rest = &rest[HEADER_LEN + name_len..];
    }
    Ok(entries)
}
