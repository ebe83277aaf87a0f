//! Allocation-state bitmaps.
//!
//! Each bitmap is 512 bytes (4096 bits), LSB-first: bit `k` of the region
//! lives in byte `k >> 3`, bit `k & 7`. `0` = free, `1` = in use. Every
//! operation here is a single seek-sized read, optionally followed by a
//! write — there is no in-memory cache, matching §4.2's "deliberately
//! simple" design note. The bit twiddling itself goes through `bit_field`
//! rather than hand-rolled masks.

use bit_field::BitField;

use crate::device::Device;
use crate::error::Result;

/// Number of bits packed into the bitmap region (one per inode, or one per
/// block).
const BITS_PER_REGION: u32 = 4096;

/// Read the bit for index `k` in the bitmap region starting at `base`.
pub fn test(device: &Device, base: u64, k: u32) -> Result<bool> {
    let byte = device.read_byte(base + (k / 8) as u64)?;
    Ok(byte.get_bit((k % 8) as usize))
}

/// Set the bit for index `k` in the bitmap region starting at `base` to
/// `value`, leaving every other bit in that byte untouched.
pub fn set(device: &mut Device, base: u64, k: u32, value: bool) -> Result<()> {
    let offset = base + (k / 8) as u64;
    let mut byte = device.read_byte(offset)?;
    byte.set_bit((k % 8) as usize, value);
    device.write_byte(offset, byte)
}

/// Scan the bitmap region starting at `base` for the first bit that is
/// clear, returning its index. Returns `None` if all `BITS_PER_REGION`
/// bits are set.
pub fn first_free(device: &Device, base: u64) -> Result<Option<u32>> {
    for k in 0..BITS_PER_REGION {
        if !test(device, base, k)? {
            return Ok(Some(k));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::INODE_BITMAP_START;
    use std::fs::{create_dir_all, remove_dir_all, remove_file};
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push(format!("target/test-images-bitmap-{}", name));
        if path.exists() {
            remove_dir_all(&path).unwrap();
        }
        create_dir_all(&path).unwrap();
        path.push("img");
        path
    }

    #[test]
    fn fresh_bitmap_is_all_free() {
        let path = scratch_path("fresh");
        let (dev, _) = Device::open_or_create(&path).unwrap();
        assert_eq!(first_free(&dev, INODE_BITMAP_START).unwrap(), Some(0));
        assert!(!test(&dev, INODE_BITMAP_START, 17).unwrap());
        drop(dev);
        remove_file(&path).unwrap();
    }

    #[test]
    fn set_and_test_round_trip() {
        let path = scratch_path("roundtrip");
        let (mut dev, _) = Device::open_or_create(&path).unwrap();
        set(&mut dev, INODE_BITMAP_START, 3, true).unwrap();
        assert!(test(&dev, INODE_BITMAP_START, 3).unwrap());
        // Neighboring bits in the same byte are untouched.
        assert!(!test(&dev, INODE_BITMAP_START, 2).unwrap());
        assert!(!test(&dev, INODE_BITMAP_START, 4).unwrap());
        assert_eq!(first_free(&dev, INODE_BITMAP_START).unwrap(), Some(0));

        set(&mut dev, INODE_BITMAP_START, 0, true).unwrap();
        set(&mut dev, INODE_BITMAP_START, 1, true).unwrap();
        assert_eq!(first_free(&dev, INODE_BITMAP_START).unwrap(), Some(2));

        set(&mut dev, INODE_BITMAP_START, 3, false).unwrap();
        assert!(!test(&dev, INODE_BITMAP_START, 3).unwrap());
        drop(dev);
        remove_file(&path).unwrap();
    }
}
