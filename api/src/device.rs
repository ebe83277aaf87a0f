//! Image backing store: a fixed-size, memory-mapped file addressed by
//! absolute byte offset.
//!
//! Generalizes `konstantinoscs-Rust_filesystem`'s `controller::Device` (a
//! `(block_size, nblocks)`-parameterized disk) down to this spec's single
//! fixed image size. There is no block-indexed API here — every caller
//! above this layer (the bitmap manager, the inode/block codec) already
//! knows the absolute offset it wants, per §4.1/§4.3 of the spec.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use memmap::{MmapMut, MmapOptions};

use crate::error::{Error, Result};
use crate::layout::IMAGE_SIZE;

/// Memory-mapped fixed-size image file.
///
/// *EXTRA*: as in the teacher's `Device`, no file locking is performed; two
/// processes opening the same image concurrently is undefined behavior,
/// which matches §5's assumption that the server owns the image
/// exclusively for its lifetime.
#[derive(Debug)]
pub struct Device {
    path: PathBuf,
    mmap: MmapMut,
}

impl Device {
    /// Open the image at `path`, creating it (mode `0666`) if it does not
    /// yet exist. Returns the device and whether the image was freshly
    /// created, so the caller can run the one-time initializer (§4.4.0)
    /// exactly when appropriate.
    ///
    /// An existing image whose size does not match [`IMAGE_SIZE`] is
    /// rejected — this spec defines no growth and no alternate sizes.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<(Device, bool)> {
        let path = path.as_ref();
        let created = !path.exists();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o666)
            .open(path)?;

        if created {
            file.set_len(IMAGE_SIZE)?;
        } else {
            let found = file.metadata()?.len();
            if found != IMAGE_SIZE {
                return Err(Error::SizeMismatch {
                    expected: IMAGE_SIZE,
                    found,
                });
            }
        }

        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };

        Ok((
            Device {
                path: path.to_path_buf(),
                mmap,
            },
            created,
        ))
    }

    /// Path of the file backing this image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        if offset + len as u64 > IMAGE_SIZE {
            return Err(Error::OutOfRange {
                offset,
                len,
                image_size: IMAGE_SIZE,
            });
        }
        Ok(())
    }

    /// Read `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let start = offset as usize;
        Ok(self.mmap[start..start + len].to_vec())
    }

    /// Read exactly `N` bytes starting at `offset`.
    pub fn read_array<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        self.check_range(offset, N)?;
        let start = offset as usize;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.mmap[start..start + N]);
        Ok(buf)
    }

    /// Write `data` starting at `offset`.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        let start = offset as usize;
        self.mmap[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Read a single byte at `offset`.
    pub fn read_byte(&self, offset: u64) -> Result<u8> {
        Ok(self.read_array::<1>(offset)?[0])
    }

    /// Write a single byte at `offset`.
    pub fn write_byte(&mut self, offset: u64, value: u8) -> Result<()> {
        self.write_at(offset, &[value])
    }

    /// Flush all writes to the underlying file.
    pub fn flush(&mut self) -> Result<()> {
        self.mmap.flush().map_err(Error::from)
    }
}
