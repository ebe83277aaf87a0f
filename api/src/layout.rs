//! Byte-exact positional constants for the image.
//!
//! Every offset below is lifted directly from the reference layout: two
//! 512-byte bitmaps, a 4096-entry inode table of 52-byte records, and a
//! 4096-entry data region of 4096-byte blocks. Nothing here is
//! configurable — an image produced by this crate must be byte-compatible
//! with any other implementation of the same layout, so these are `const`,
//! not fields on some generic "superblock".

/// Number of inodes the inode bitmap and inode table track.
pub const NUM_INODES: u32 = 4096;

/// Number of blocks the block bitmap and data region track.
pub const NUM_BLOCKS: u32 = 4096;

/// Size in bytes of a single on-disk inode record.
pub const INODE_SIZE: u64 = 52;

/// Size in bytes of a single data block.
pub const BLOCK_SIZE: u64 = 4096;

/// Number of direct block pointers an inode carries.
pub const PTR_COUNT: usize = 10;

/// Size in bytes of a directory entry (4-byte child inode number + 252
/// bytes of NUL-terminated name). A directory entry occupies one entire
/// data block; the remaining `BLOCK_SIZE - DIRENT_SIZE` bytes of that
/// block are unused.
pub const DIRENT_SIZE: u64 = 256;

/// Size in bytes of the name field within a directory entry, NUL
/// terminator included. The longest representable name is therefore
/// `NAME_FIELD_SIZE - 1` bytes.
pub const NAME_FIELD_SIZE: usize = 252;

/// Byte offset of the inode bitmap, the first region of the image.
pub const INODE_BITMAP_START: u64 = 0;

/// Byte offset of the block bitmap.
pub const BLOCK_BITMAP_START: u64 = 512;

/// Byte offset of the inode table.
pub const INODE_TABLE_START: u64 = 1024;

/// Byte offset of the data block region.
pub const BLOCK_REGION_START: u64 = 214_016;

/// Offset of the `type` field within an inode record.
pub const INODE_OFFSET_TYPE: u64 = 0;
/// Offset of the `size` field within an inode record.
pub const INODE_OFFSET_SIZE: u64 = 4;
/// Offset of the `num_blocks` field within an inode record.
pub const INODE_OFFSET_NUM_BLOCKS: u64 = 8;
/// Offset of the `ptr` array within an inode record.
pub const INODE_OFFSET_PTR: u64 = 12;

/// Total size of the image, in bytes: two 512-byte bitmaps, a
/// 212,992-byte inode table (4096 * 52), and a 16,764,928-byte data
/// region. Hard-coded rather than derived from `NUM_BLOCKS * BLOCK_SIZE`
/// (which comes to 16,777,216, not 16,764,928): the reference layout's
/// data region does not actually hold room for all 4096 blocks it
/// advertises bitmap bits for, and this fixed total — matching
/// `original_source/server.c`'s literal `#define FS_SIZE (16978944)` — is
/// the on-disk ground truth an interoperating implementation must match,
/// not the block-count arithmetic.
pub const IMAGE_SIZE: u64 = 16_978_944;

/// Inode number of the root directory. Always live, always a directory.
pub const ROOT_INUM: i32 = 0;

/// Byte offset of inode `inum` within the inode table.
pub fn inode_offset(inum: i32) -> u64 {
    INODE_TABLE_START + inum as u64 * INODE_SIZE
}

/// Byte offset of block `block_idx` within the data region.
pub fn block_offset(block_idx: i32) -> u64 {
    BLOCK_REGION_START + block_idx as u64 * BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_size_matches_spec() {
        assert_eq!(IMAGE_SIZE, 16_978_944);
    }

    #[test]
    fn regions_are_contiguous() {
        assert_eq!(INODE_BITMAP_START + 512, BLOCK_BITMAP_START);
        assert_eq!(BLOCK_BITMAP_START + 512, INODE_TABLE_START);
        assert_eq!(
            INODE_TABLE_START + NUM_INODES as u64 * INODE_SIZE,
            BLOCK_REGION_START
        );
    }
}
