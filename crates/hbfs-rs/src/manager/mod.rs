//! Path-level access to one disk: a working directory, name-based entry
//! operations and open handles that pin paths against deletion.


pub mod handles;

use tracing::{debug, info};

use crate::config::{PATH_SEPARATOR, ROOT_INODE};
use crate::disk::{Disk, DiskReport};
use crate::error::{FsError, FsResult};
use crate::node::NodeKind;
use crate::node::directory::{Directory, PARENT_ENTRY, SELF_ENTRY};
use crate::node::inode::Inode;
use crate::node::stream::FileStream;
use crate::storage::medium::Medium;

use self::handles::{OpenHandles, Target};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub modified: u64,
}

#[derive(Debug, Clone)]
struct Segment {
    name: String,
    inode: u64,
}

pub struct DiskManager<M: Medium> {
    disk: Disk<M>,
    cwd: Vec<Segment>,
    handles: OpenHandles,
}

impl<M: Medium> DiskManager<M> {
    /// Wraps `disk` with the working directory at `/`.
    pub fn new(mut disk: Disk<M>) -> FsResult<Self> {
        Directory::open(&mut disk, ROOT_INODE)?;
        Ok(Self {
            disk,
            cwd: Vec::new(),
            handles: OpenHandles::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.disk.name()
    }

    #[must_use]
    pub const fn disk(&self) -> &Disk<M> {
        &self.disk
    }

    #[must_use]
    pub fn report(&self) -> DiskReport {
        self.disk.report()
    }

    #[must_use]
    pub fn has_open_handles(&self) -> bool {
        !self.handles.is_empty()
    }

    #[must_use]
    pub fn open_handles(&self) -> Vec<&str> {
        self.handles.open_paths()
    }

    pub fn rename_disk(&mut self, new_name: &str) -> FsResult<()> {
        if self.has_open_handles() {
            return Err(FsError::ResourceBusy(self.disk.name().to_string()));
        }
        self.disk.rename(new_name)
    }

    #[must_use]
    pub fn current_path(&self) -> String {
        render(&self.cwd)
    }

    /// Changes the working directory. `path` is absolute when it starts
    /// with `/`; `.` stays put and `..` climbs, stopping at the root.
    ///
    /// # Errors
    /// Returns `NotFound` for a missing segment and `InvalidOperation` when
    /// a segment is a file. The working directory is unchanged on error.
    pub fn navigate(&mut self, path: &str) -> FsResult<String> {
        let (stack, kind) = self.walk(path)?;
        if !kind.is_directory() {
            return Err(FsError::invalid(format!("{} is not a directory", render(&stack))));
        }
        self.cwd = stack;
        let current = self.current_path();
        debug!(disk = %self.disk.name(), cwd = %current, "navigated");
        Ok(current)
    }

    pub fn create_file(&mut self, name: &str) -> FsResult<()> {
        let mut dir = self.current_directory()?;
        dir.create_file(&mut self.disk, name)?;
        Ok(())
    }

    pub fn create_directory(&mut self, name: &str) -> FsResult<()> {
        let mut dir = self.current_directory()?;
        dir.create_directory(&mut self.disk, name)?;
        Ok(())
    }

    /// Deletes `name` from the working directory.
    pub fn delete(&mut self, name: &str, recursive: bool) -> FsResult<()> {
        reject_dot(name)?;
        self.handles.ensure_idle(&self.child_path(name))?;
        let mut dir = self.current_directory()?;
        dir.delete(&mut self.disk, name, recursive)
    }

    /// Renames `old` to `new` inside the working directory.
    pub fn rename(&mut self, old: &str, new: &str) -> FsResult<()> {
        reject_dot(old)?;
        self.handles.ensure_idle(&self.child_path(old))?;
        let mut dir = self.current_directory()?;
        dir.rename(&mut self.disk, old, new)
    }

    /// Entries of the working directory in stored order, dot entries
    /// included.
    pub fn list_entries(&mut self) -> FsResult<Vec<EntryInfo>> {
        let dir = self.current_directory()?;
        dir.entries()
            .iter()
            .map(|entry| {
                let inode = Inode::open(&mut self.disk, entry.inode).map_err(|err| match err {
                    FsError::NotFound(_) => FsError::corrupt(format!(
                        "entry {} points at free inode {}",
                        entry.name, entry.inode
                    )),
                    other => other,
                })?;
                Ok(EntryInfo {
                    name: entry.name.clone(),
                    kind: entry.kind,
                    size: inode.size(),
                    modified: inode.modified(),
                })
            })
            .collect()
    }

    /// Opens `path` (file or directory) and returns its canonical path as
    /// the handle.
    pub fn open(&mut self, path: &str) -> FsResult<String> {
        let (stack, kind) = self.walk(path)?;
        let inode = stack.last().map_or(ROOT_INODE, |s| s.inode);
        Ok(self.handles.open(&render(&stack), Target { inode, kind }))
    }

    pub fn close(&mut self, handle: &str) -> FsResult<()> {
        self.handles.close(handle)
    }

    /// Reads the whole content behind an open file handle.
    pub fn read_all(&mut self, handle: &str) -> FsResult<Vec<u8>> {
        let inode = self.file_target(handle)?;
        FileStream::open(&mut self.disk, inode)?.read(&mut self.disk, 0)
    }

    /// Replaces the whole content behind an open file handle.
    pub fn write_all(&mut self, handle: &str, content: &[u8]) -> FsResult<()> {
        let inode = self.file_target(handle)?;
        FileStream::open(&mut self.disk, inode)?.write(&mut self.disk, content, true)?;
        debug!(handle, len = content.len(), "wrote file");
        Ok(())
    }

    pub fn flush(&mut self) -> FsResult<()> {
        self.disk.flush()
    }

    /// Flushes and hands the disk back.
    pub fn into_disk(mut self) -> FsResult<Disk<M>> {
        self.disk.flush()?;
        info!(disk = %self.disk.name(), "released disk");
        Ok(self.disk)
    }

    fn current_directory(&mut self) -> FsResult<Directory> {
        let inode = self.cwd.last().map_or(ROOT_INODE, |s| s.inode);
        Directory::open(&mut self.disk, inode)
    }

    fn child_path(&self, name: &str) -> String {
        let mut path = self.current_path();
        if !path.ends_with(PATH_SEPARATOR) {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(name);
        path
    }

    fn file_target(&self, handle: &str) -> FsResult<u64> {
        let target = self.handles.target(handle)?;
        if target.kind.is_directory() {
            return Err(FsError::invalid(format!("{handle} is a directory")));
        }
        Ok(target.inode)
    }

    /// Resolves `path` to the segments from the root down to it and the
    /// kind of its last segment.
    fn walk(&mut self, path: &str) -> FsResult<(Vec<Segment>, NodeKind)> {
        let mut stack = if path.starts_with(PATH_SEPARATOR) {
            Vec::new()
        } else {
            self.cwd.clone()
        };
        let mut kind = NodeKind::Directory;

        for part in path.split(PATH_SEPARATOR).filter(|p| !p.is_empty()) {
            if !kind.is_directory() {
                return Err(FsError::invalid(format!("{} is not a directory", render(&stack))));
            }
            match part {
                SELF_ENTRY => {}
                PARENT_ENTRY => {
                    stack.pop();
                }
                name => {
                    let parent = stack.last().map_or(ROOT_INODE, |s| s.inode);
                    let dir = Directory::open(&mut self.disk, parent)?;
                    let entry = dir.find(name).ok_or_else(|| {
                        let mut missing = render(&stack);
                        if !missing.ends_with(PATH_SEPARATOR) {
                            missing.push(PATH_SEPARATOR);
                        }
                        missing.push_str(name);
                        FsError::NotFound(missing)
                    })?;
                    kind = entry.kind;
                    stack.push(Segment {
                        name: name.to_string(),
                        inode: entry.inode,
                    });
                }
            }
        }
        Ok((stack, kind))
    }
}

fn reject_dot(name: &str) -> FsResult<()> {
    if name == SELF_ENTRY || name == PARENT_ENTRY {
        return Err(FsError::invalid(format!("{name:?} cannot be targeted")));
    }
    Ok(())
}

fn render(stack: &[Segment]) -> String {
    if stack.is_empty() {
        return PATH_SEPARATOR.to_string();
    }
    stack.iter().fold(String::new(), |mut out, segment| {
        out.push(PATH_SEPARATOR);
        out.push_str(&segment.name);
        out
    })
}
