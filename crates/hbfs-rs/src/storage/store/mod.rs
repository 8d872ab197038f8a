#[cfg(test)]
mod store_tests;

use std::io;

use super::medium::Medium;

/// Cursor-based byte store over a growable medium.
///
/// Seeking, reading or writing past the end zero-extends the store so that
/// its length is always one past the highest byte ever touched.
pub struct BlockStore<M: Medium> {
    medium: M,
    cursor: u64,
}

impl<M: Medium> BlockStore<M> {
    pub const fn new(medium: M) -> Self {
        Self { medium, cursor: 0 }
    }

    pub fn len(&self) -> u64 {
        self.medium.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medium.is_empty()
    }

    pub const fn position(&self) -> u64 {
        self.cursor
    }

    pub const fn medium(&self) -> &M {
        &self.medium
    }

    pub fn into_medium(self) -> M {
        self.medium
    }

    pub fn seek(&mut self, off: u64) -> io::Result<()> {
        self.touch(off, 1)?;
        self.cursor = off;
        Ok(())
    }

    /// Reads `len` bytes at the cursor; bytes never written read as zero.
    pub fn read(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.touch(self.cursor, buf.len())?;
        self.medium.read_at(self.cursor, buf)?;
        self.cursor += buf.len() as u64;
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.touch(self.cursor, data.len())?;
        self.medium.write_at(self.cursor, data)?;
        self.cursor += data.len() as u64;
        Ok(())
    }

    /// `read_at` is `seek` followed by `read`.
    pub fn read_at(&mut self, off: u64, len: usize) -> io::Result<Vec<u8>> {
        self.seek(off)?;
        self.read(len)
    }

    /// `write_at` is `seek` followed by `write`.
    pub fn write_at(&mut self, off: u64, data: &[u8]) -> io::Result<()> {
        self.seek(off)?;
        self.write(data)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.medium.flush()
    }

    fn touch(&mut self, off: u64, n: usize) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        let end = off
            .checked_add(n as u64)
            .ok_or_else(|| io::Error::other("store offset overflow"))?;
        if end > self.medium.len() {
            self.medium.grow(end)?;
        }
        Ok(())
    }
}
