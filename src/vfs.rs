//! Host storage callbacks.
//!
//! The library does not open files itself; the host hands it a storage
//! implementation. The write side needs positioned reads, positioned
//! writes and a durable flush; the read side only ever reads. The two
//! capabilities are separate traits so a read context never drags along
//! write methods it cannot use.
//!
//! Callbacks may block for as long as they like; the library makes one
//! call at a time and surfaces any failure verbatim, leaving the buffer
//! consistent for a later finalize or recover.

use crate::error::Error;

/// Storage capability of a read context.
pub trait ReadVfs {
    /// Reads exactly `buf.len()` bytes at absolute offset `pos`.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), Error>;
}

/// Storage capability of a write context.
pub trait WriteVfs {
    /// Reads exactly `buf.len()` bytes at absolute offset `pos`.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), Error>;
    /// Writes all of `buf` at absolute offset `pos`.
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<(), Error>;
    /// Makes previous writes durable.
    fn flush(&mut self) -> Result<(), Error>;
}

impl<T: ReadVfs + ?Sized> ReadVfs for &mut T {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read_at(pos, buf)
    }
}

impl<T: WriteVfs + ?Sized> WriteVfs for &mut T {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read_at(pos, buf)
    }
    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<(), Error> {
        (**self).write_at(pos, buf)
    }
    fn flush(&mut self) -> Result<(), Error> {
        (**self).flush()
    }
}

/// An in-memory database file.
///
/// Useful for hosts without a filesystem and throughout the tests. Writes
/// past the current end grow the file with zeros, like a sparse file.
#[derive(Debug, Default, Clone)]
pub struct MemVfs {
    data: Vec<u8>,
}

impl MemVfs {
    pub fn new() -> MemVfs {
        MemVfs::default()
    }

    pub fn from_bytes(data: Vec<u8>) -> MemVfs {
        MemVfs { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drops everything at and past `len`, as a crash mid-write would.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }
}

impl ReadVfs for MemVfs {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), Error> {
        let pos = pos as usize;
        let end = pos.checked_add(buf.len()).ok_or(Error::Read)?;
        if end > self.data.len() {
            return Err(Error::Read);
        }
        buf.copy_from_slice(&self.data[pos..end]);
        Ok(())
    }
}

impl WriteVfs for MemVfs {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<(), Error> {
        ReadVfs::read_at(self, pos, buf)
    }

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> Result<(), Error> {
        let pos = pos as usize;
        let end = pos.checked_add(buf.len()).ok_or(Error::Write)?;
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[pos..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[test]
fn test_mem_vfs_read_write() {
    let mut vfs = MemVfs::new();
    vfs.write_at(4, &[1, 2, 3]).unwrap();
    assert_eq!(vfs.len(), 7);
    assert_eq!(vfs.as_bytes(), &[0, 0, 0, 0, 1, 2, 3]);

    let mut buf = [0u8; 3];
    ReadVfs::read_at(&mut vfs, 4, &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3]);

    // Reading past the end fails like a short read would.
    assert_eq!(ReadVfs::read_at(&mut vfs, 5, &mut buf), Err(Error::Read));
}
