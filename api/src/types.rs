//! The 52-byte inode record and the 256-byte directory entry, encoded the
//! way `original_source/server.c` does: raw little-endian 32-bit integers
//! at fixed positional offsets, no serialization framework involved.
//!
//! A generic `serde`/`bincode` round trip (as used by
//! `konstantinoscs-Rust_filesystem`'s `types::DInode`) was considered and
//! rejected — see `SPEC_FULL.md` §A.4 — because this spec requires
//! byte-for-byte compatibility between independent implementations, and
//! `bincode`'s default integer encoding does not guarantee a fixed 4-byte
//! width.

use crate::error::{Error, Result};
use crate::layout::{
    DIRENT_SIZE, INODE_OFFSET_NUM_BLOCKS, INODE_OFFSET_PTR, INODE_OFFSET_SIZE, INODE_OFFSET_TYPE,
    INODE_SIZE, NAME_FIELD_SIZE, PTR_COUNT,
};

/// The two file kinds an inode can carry. Stored on disk as `0`/`1` in the
/// `type` field; anything else is not a valid inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// A directory: its blocks are directory entries, one per block.
    Directory,
    /// A regular file: its blocks are opaque payload.
    Regular,
}

impl FileKind {
    /// Decode the on-disk `type` field. Returns `None` for any value other
    /// than `0` (directory) or `1` (regular file) — such an inode is not
    /// addressable through the six primitives and callers should treat it
    /// as "not live" for type-checking purposes.
    pub fn from_i32(v: i32) -> Option<FileKind> {
        match v {
            0 => Some(FileKind::Directory),
            1 => Some(FileKind::Regular),
            _ => None,
        }
    }

    /// Encode this kind as the on-disk `type` value.
    pub fn as_i32(self) -> i32 {
        match self {
            FileKind::Directory => 0,
            FileKind::Regular => 1,
        }
    }
}

/// In-memory view of a 52-byte on-disk inode record.
///
/// Fields mirror §3 exactly: `type` at offset 0, `size` at offset 4,
/// `num_blocks` at offset 8, and ten direct block pointers from offset 12
/// onward, each `-1` when unused. There is no indirection and no inode
/// caching — every read/write goes straight through [`crate::Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInode {
    /// `0` = directory, `1` = regular file. Kept as the raw `i32` (rather
    /// than [`FileKind`]) so that a value outside `{0, 1}` — which can
    /// appear in a never-initialized inode slot — round-trips without
    /// forcing a decode failure on read.
    pub file_type: i32,
    /// Total bytes logically held (directory entries count 256 bytes
    /// each; see the `num_blocks` discrepancy documented in §3 I6/§9).
    pub size: i32,
    /// Count of live (non -1) entries in `ptr`. Subject to the same
    /// documented discrepancy for directories.
    pub num_blocks: i32,
    /// Up to [`PTR_COUNT`] direct block pointers, `-1` when unused.
    pub ptr: [i32; PTR_COUNT],
}

impl RawInode {
    /// A freshly allocated inode of the given kind: zero size, zero
    /// blocks, every pointer unused.
    pub fn new(kind: FileKind) -> RawInode {
        RawInode {
            file_type: kind.as_i32(),
            size: 0,
            num_blocks: 0,
            ptr: [-1; PTR_COUNT],
        }
    }

    /// Whether the `type` field decodes to [`FileKind::Directory`].
    pub fn is_directory(&self) -> bool {
        self.file_type == FileKind::Directory.as_i32()
    }

    /// Serialize to the exact 52-byte on-disk representation.
    pub fn to_bytes(&self) -> [u8; INODE_SIZE as usize] {
        let type_off = INODE_OFFSET_TYPE as usize;
        let size_off = INODE_OFFSET_SIZE as usize;
        let num_blocks_off = INODE_OFFSET_NUM_BLOCKS as usize;
        let ptr_off = INODE_OFFSET_PTR as usize;

        let mut buf = [0u8; INODE_SIZE as usize];
        buf[type_off..type_off + 4].copy_from_slice(&self.file_type.to_le_bytes());
        buf[size_off..size_off + 4].copy_from_slice(&self.size.to_le_bytes());
        buf[num_blocks_off..num_blocks_off + 4].copy_from_slice(&self.num_blocks.to_le_bytes());
        for (i, p) in self.ptr.iter().enumerate() {
            let start = ptr_off + i * 4;
            buf[start..start + 4].copy_from_slice(&p.to_le_bytes());
        }
        buf
    }

    /// Parse the exact 52-byte on-disk representation.
    pub fn from_bytes(buf: &[u8; INODE_SIZE as usize]) -> RawInode {
        let mut le4 = |at: usize| i32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        let file_type = le4(INODE_OFFSET_TYPE as usize);
        let size = le4(INODE_OFFSET_SIZE as usize);
        let num_blocks = le4(INODE_OFFSET_NUM_BLOCKS as usize);
        let mut ptr = [-1i32; PTR_COUNT];
        for (i, p) in ptr.iter_mut().enumerate() {
            *p = le4(INODE_OFFSET_PTR as usize + i * 4);
        }
        RawInode {
            file_type,
            size,
            num_blocks,
            ptr,
        }
    }
}

/// In-memory view of a 256-byte directory entry: a 4-byte child inode
/// number followed by a NUL-terminated name of up to 251 bytes plus its
/// terminator. Stored as the first 256 bytes of an otherwise-dedicated
/// 4096-byte data block (§3).
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Inode number of the entry's target.
    pub child_inum: i32,
    /// NUL-padded name field, exactly [`NAME_FIELD_SIZE`] bytes.
    name_field: [u8; NAME_FIELD_SIZE],
}

impl DirEntry {
    /// Build a directory entry pointing at `child_inum` named `name`.
    /// `name` must fit in [`NAME_FIELD_SIZE`] - 1 bytes; the on-disk field
    /// is always NUL-padded after it.
    pub fn new(child_inum: i32, name: &[u8]) -> Result<DirEntry> {
        if name.len() > NAME_FIELD_SIZE - 1 {
            return Err(Error::NameTooLong {
                max: NAME_FIELD_SIZE,
            });
        }
        let mut name_field = [0u8; NAME_FIELD_SIZE];
        name_field[..name.len()].copy_from_slice(name);
        Ok(DirEntry {
            child_inum,
            name_field,
        })
    }

    /// The name, stopping at the first NUL (or the end of the field if
    /// there is none, though a well-formed entry always has one).
    pub fn name(&self) -> &[u8] {
        let end = self
            .name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        &self.name_field[..end]
    }

    /// Bytewise equality of NUL-terminated names, bounded at
    /// [`NAME_FIELD_SIZE`] - 1 bytes (§3 I5).
    pub fn name_matches(&self, other: &[u8]) -> bool {
        self.name() == other
    }

    /// Serialize to the exact 256-byte on-disk representation.
    pub fn to_bytes(&self) -> [u8; DIRENT_SIZE as usize] {
        let mut buf = [0u8; DIRENT_SIZE as usize];
        buf[0..4].copy_from_slice(&self.child_inum.to_le_bytes());
        buf[4..4 + NAME_FIELD_SIZE].copy_from_slice(&self.name_field);
        buf
    }

    /// Parse the exact 256-byte on-disk representation.
    pub fn from_bytes(buf: &[u8; DIRENT_SIZE as usize]) -> DirEntry {
        let child_inum = i32::from_le_bytes(buf[0..4].try_into().unwrap());
        let mut name_field = [0u8; NAME_FIELD_SIZE];
        name_field.copy_from_slice(&buf[4..4 + NAME_FIELD_SIZE]);
        DirEntry {
            child_inum,
            name_field,
        }
    }
}
