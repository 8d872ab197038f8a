#[cfg(test)]
mod medium_tests;

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

/// Minimum headroom an image file grows by, so block-at-a-time growth does
/// not remap on every allocation.
const IMAGE_GROW_STEP: u64 = 1 << 20;

/// Random-access byte medium backing a block store.
///
/// Offsets passed to `read_at`/`write_at` must lie inside `len()`; callers
/// grow the medium first.
pub trait Medium {
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-extends the medium to at least `len` bytes.
    fn grow(&mut self, len: u64) -> io::Result<()>;

    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()>;

    fn write_at(&mut self, off: u64, data: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

fn range(off: u64, n: usize, len: u64) -> io::Result<(usize, usize)> {
    let end = off
        .checked_add(n as u64)
        .filter(|end| *end <= len)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("range {off}+{n} outside medium of {len} bytes"),
            )
        })?;
    let start = usize::try_from(off).map_err(io::Error::other)?;
    let end = usize::try_from(end).map_err(io::Error::other)?;
    Ok((start, end))
}

/// Heap buffer medium; the default for freshly created disks.
#[derive(Debug, Default, Clone)]
pub struct MemoryMedium {
    bytes: Vec<u8>,
}

impl MemoryMedium {
    #[must_use]
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Wraps an existing image, e.g. one read from a file or a request body.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Medium for MemoryMedium {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn grow(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(io::Error::other)?;
        if len > self.bytes.len() {
            self.bytes.resize(len, 0);
        }
        Ok(())
    }

    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()> {
        let (start, end) = range(off, buf.len(), self.len())?;
        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    fn write_at(&mut self, off: u64, data: &[u8]) -> io::Result<()> {
        let (start, end) = range(off, data.len(), self.len())?;
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Disk image file mapped into memory.
///
/// The file is grown ahead of the logical length and trimmed back on
/// `flush`, so the image on disk is exactly as long as the store.
pub struct ImageMedium {
    path: PathBuf,
    file: File,
    map: Option<MmapMut>,
    len: u64,
    mapped: u64,
}

impl ImageMedium {
    /// Creates (or truncates) an empty image at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            file,
            map: None,
            len: 0,
            mapped: 0,
        })
    }

    /// Opens an existing image and maps its current contents.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        let mut image = Self {
            path,
            file,
            map: None,
            len,
            mapped: 0,
        };
        image.remap(len)?;
        Ok(image)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remap(&mut self, mapped: u64) -> io::Result<()> {
        self.map.take();
        self.file.set_len(mapped)?;
        self.mapped = mapped;
        if mapped == 0 {
            return Ok(());
        }
        let map_len = usize::try_from(mapped).map_err(|_| {
            io::Error::other(format!("image length {mapped} exceeds addressable size"))
        })?;
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(&self.file)? };
        self.map = Some(map);
        Ok(())
    }
}

impl Medium for ImageMedium {
    fn len(&self) -> u64 {
        self.len
    }

    fn grow(&mut self, len: u64) -> io::Result<()> {
        if len <= self.len {
            return Ok(());
        }
        if len > self.mapped {
            let target = len
                .max(self.mapped.saturating_mul(2))
                .max(self.mapped + IMAGE_GROW_STEP);
            if let Some(map) = self.map.as_ref() {
                map.flush()?;
            }
            self.remap(target)?;
        }
        self.len = len;
        Ok(())
    }

    fn read_at(&self, off: u64, buf: &mut [u8]) -> io::Result<()> {
        let (start, end) = range(off, buf.len(), self.len)?;
        if buf.is_empty() {
            return Ok(());
        }
        let Some(map) = self.map.as_ref() else {
            return Err(io::Error::other("image is not mapped"));
        };
        buf.copy_from_slice(&map[start..end]);
        Ok(())
    }

    fn write_at(&mut self, off: u64, data: &[u8]) -> io::Result<()> {
        let (start, end) = range(off, data.len(), self.len)?;
        if data.is_empty() {
            return Ok(());
        }
        let Some(map) = self.map.as_mut() else {
            return Err(io::Error::other("image is not mapped"));
        };
        map[start..end].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(map) = self.map.as_ref() {
            map.flush()?;
        }
        if self.mapped != self.len {
            self.remap(self.len)?;
        }
        self.file.sync_all()
    }
}

impl Drop for ImageMedium {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
