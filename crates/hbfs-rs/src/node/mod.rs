//! Files and directories: inode records, block-chain streams over them, and
//! directories encoded as stream content.

pub mod directory;
pub mod inode;
pub mod stream;

use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::storage::medium::Medium;

use self::directory::Directory;
use self::stream::FileStream;

/// Entry type byte stored in directory records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    File = 0,
    Directory = 1,
}

impl NodeKind {
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> FsResult<Self> {
        match byte {
            0 => Ok(Self::File),
            1 => Ok(Self::Directory),
            other => Err(FsError::corrupt(format!("unknown entry type {other}"))),
        }
    }

    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// An opened inode: both variants share the same stream machinery.
pub enum Node {
    File(FileStream),
    Directory(Directory),
}

impl Node {
    /// Opens inode `number` as `kind`.
    pub fn open<M: Medium>(disk: &mut Disk<M>, number: u64, kind: NodeKind) -> FsResult<Self> {
        Ok(match kind {
            NodeKind::File => Self::File(FileStream::open(disk, number)?),
            NodeKind::Directory => Self::Directory(Directory::open(disk, number)?),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::File(_) => NodeKind::File,
            Self::Directory(_) => NodeKind::Directory,
        }
    }

    #[must_use]
    pub const fn stream(&self) -> &FileStream {
        match self {
            Self::File(stream) => stream,
            Self::Directory(dir) => dir.stream(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bytes() {
        assert_eq!(NodeKind::File.as_byte(), 0);
        assert_eq!(NodeKind::Directory.as_byte(), 1);
        assert_eq!(NodeKind::from_byte(1).expect("dir"), NodeKind::Directory);
        assert!(matches!(NodeKind::from_byte(7), Err(FsError::Corrupt(_))));
    }

    #[test]
    fn open_picks_the_variant() {
        let mut disk = crate::test_utils::small_disk(16, 4);
        let mut root = Directory::open(&mut disk, crate::config::ROOT_INODE).expect("root");
        let dir = root.create_directory(&mut disk, "d").expect("dir");
        let file = root.create_file(&mut disk, "f").expect("file");

        let node = Node::open(&mut disk, dir, NodeKind::Directory).expect("open dir");
        assert_eq!(node.kind(), NodeKind::Directory);
        assert_eq!(node.stream().inode().number(), dir);
        if let Node::Directory(d) = node {
            assert_eq!(d.entries().len(), 2);
        }

        let node = Node::open(&mut disk, file, NodeKind::File).expect("open file");
        assert_eq!(node.kind(), NodeKind::File);
        assert_eq!(node.stream().size(), 0);
    }
}
