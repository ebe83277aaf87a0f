//! The six file-system primitives (§4.4) plus the one-time image
//! initializer (§4.4.0), composed from `mfsd-api`'s bitmap manager and
//! inode/block codec.
//!
//! Every primitive here follows the same shape: validate the request
//! against the data-model invariants of §3, and if anything fails, return
//! a refusal value (`Ok` carrying the protocol's `-1`/`false`/`None`) —
//! never an `Err`. An `Err` from one of these methods means the backing
//! image itself faulted (§7's "storage errors"), which the dispatcher
//! folds into a `-1` reply without distinguishing it from a semantic
//! refusal on the wire.

use std::path::Path;

use mfsd_api::bitmap;
use mfsd_api::layout::{
    self, BLOCK_BITMAP_START, INODE_BITMAP_START, NUM_BLOCKS, NUM_INODES, PTR_COUNT, ROOT_INUM,
};
use mfsd_api::types::{DirEntry, FileKind, RawInode};
use mfsd_api::{Device, Result};

/// The four values a successful `stat` reports (§4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// `0` = directory, `1` = regular file.
    pub file_type: i32,
    /// Total bytes logically held.
    pub size: i32,
    /// Count of live direct block pointers (subject to the directory
    /// `num_blocks` discrepancy documented in §3 I6 / §9).
    pub num_blocks: i32,
}

/// The file system: an image plus the six primitives built on top of it.
pub struct FileSystem {
    device: Device,
}

impl FileSystem {
    /// Open the image at `path`, creating and initializing it (§4.4.0) if
    /// it does not already exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileSystem> {
        let (device, created) = Device::open_or_create(path)?;
        let mut fs = FileSystem { device };
        if created {
            fs.reset_fs()?;
        }
        Ok(fs)
    }

    /// Flush the image to disk. The dispatcher calls this after every
    /// processed request (see `SPEC_FULL.md` §A.6 on the unconditional
    /// `fsync` in `original_source/server.c`).
    pub fn flush(&mut self) -> Result<()> {
        self.device.flush()
    }

    /// Path of the backing image file, for startup logging.
    pub fn path(&self) -> &Path {
        self.device.path()
    }

    // ---- §4.4.0 initialization -------------------------------------

    fn reset_fs(&mut self) -> Result<()> {
        bitmap::set(&mut self.device, INODE_BITMAP_START, ROOT_INUM as u32, true)?;

        let mut root = RawInode::new(FileKind::Directory);
        self.write_inode(ROOT_INUM, &root)?;

        let dot = self.alloc_block()?;
        self.write_dirent(dot, &DirEntry::new(ROOT_INUM, b".")?)?;
        root.ptr[0] = dot;
        root.size += layout::DIRENT_SIZE as i32;
        root.num_blocks = 1;
        self.write_inode(ROOT_INUM, &root)?;

        let dotdot = self.alloc_block()?;
        self.write_dirent(dotdot, &DirEntry::new(ROOT_INUM, b"..")?)?;
        root.ptr[1] = dotdot;
        root.size += layout::DIRENT_SIZE as i32;
        // num_blocks intentionally stays at 1: see §3 I6 / §9.
        self.write_inode(ROOT_INUM, &root)?;

        self.flush()
    }

    // ---- low-level inode/block accessors ----------------------------

    fn inum_in_range(inum: i32) -> bool {
        inum >= 0 && (inum as u32) < NUM_INODES
    }

    fn inum_live(&self, inum: i32) -> Result<bool> {
        bitmap::test(&self.device, INODE_BITMAP_START, inum as u32)
    }

    fn read_inode(&self, inum: i32) -> Result<RawInode> {
        let bytes = self.device.read_array(layout::inode_offset(inum))?;
        Ok(RawInode::from_bytes(&bytes))
    }

    fn write_inode(&mut self, inum: i32, inode: &RawInode) -> Result<()> {
        self.device
            .write_at(layout::inode_offset(inum), &inode.to_bytes())
    }

    fn read_dirent(&self, block_idx: i32) -> Result<DirEntry> {
        let bytes = self.device.read_array(layout::block_offset(block_idx));
        bytes.map(|b| DirEntry::from_bytes(&b))
    }

    fn write_dirent(&mut self, block_idx: i32, entry: &DirEntry) -> Result<()> {
        self.device
            .write_at(layout::block_offset(block_idx), &entry.to_bytes())
    }

    /// Allocate the first free block, mark it used, and return its index.
    /// Callers that can fail gracefully on exhaustion should use
    /// `bitmap::first_free` directly instead; this helper is only used by
    /// the initializer, where running out of blocks on a fresh image is
    /// an unrecoverable storage fault.
    fn alloc_block(&mut self) -> Result<i32> {
        let idx = bitmap::first_free(&self.device, BLOCK_BITMAP_START)?
            .expect("a freshly created image always has free blocks");
        bitmap::set(&mut self.device, BLOCK_BITMAP_START, idx, true)?;
        Ok(idx as i32)
    }

    /// Scan the block bitmap for `n` distinct free indices without
    /// marking any of them, returning `None` if fewer than `n` exist.
    /// `creat` uses this to confirm every block a request could need is
    /// actually available *before* mutating anything, so a refusal never
    /// leaves behind a partially-allocated inode or directory (§4.4:
    /// "a returned −1 always means operation refused, image unchanged").
    fn find_n_free_blocks(&self, n: usize) -> Result<Option<Vec<u32>>> {
        let mut found = Vec::with_capacity(n);
        for k in 0..NUM_BLOCKS {
            if found.len() == n {
                break;
            }
            if !bitmap::test(&self.device, BLOCK_BITMAP_START, k)? {
                found.push(k);
            }
        }
        Ok(if found.len() == n { Some(found) } else { None })
    }

    /// Find the directory entry named `name` directly inside `pinum`
    /// (no recursive path resolution — §1's non-goal). Returns the
    /// entry's child inode number together with the slot index it was
    /// found at, so mutators can address that exact slot afterward
    /// without a second, independently-keyed search (see the unlink
    /// slot-lookup fix required by §9 Open Question 3).
    fn find_entry(&self, parent: &RawInode, name: &[u8]) -> Result<Option<(i32, usize, i32)>> {
        for (slot, &block_idx) in parent.ptr.iter().enumerate() {
            if block_idx == -1 {
                continue;
            }
            let entry = self.read_dirent(block_idx)?;
            if entry.name_matches(name) {
                return Ok(Some((entry.child_inum, slot, block_idx)));
            }
        }
        Ok(None)
    }

    // ---- §4.4.1 lookup ------------------------------------------------

    /// `lookup(pinum, name) -> inum | -1` (§4.4.1). No side effects.
    pub fn lookup(&self, pinum: i32, name: &[u8]) -> Result<i32> {
        if !Self::inum_in_range(pinum) || !self.inum_live(pinum)? {
            return Ok(-1);
        }
        let parent = self.read_inode(pinum)?;
        if !parent.is_directory() {
            return Ok(-1);
        }
        Ok(self
            .find_entry(&parent, name)?
            .map(|(child_inum, _, _)| child_inum)
            .unwrap_or(-1))
    }

    // ---- §4.4.2 stat ----------------------------------------------------

    /// `stat(inum) -> (code, type, size, num_blocks)` (§4.4.2), reported
    /// as `None` on the `-1` case.
    pub fn stat(&self, inum: i32) -> Result<Option<Stat>> {
        if !Self::inum_in_range(inum) || !self.inum_live(inum)? {
            return Ok(None);
        }
        let inode = self.read_inode(inum)?;
        Ok(Some(Stat {
            file_type: inode.file_type,
            size: inode.size,
            num_blocks: inode.num_blocks,
        }))
    }

    // ---- §4.4.3 read ----------------------------------------------------

    /// `read(inum, block) -> (code, bytes[4096])` (§4.4.3), reported as
    /// `None` on the `-1` case.
    pub fn read(&self, inum: i32, block: i32) -> Result<Option<Box<[u8]>>> {
        if !Self::inum_in_range(inum) || !self.inum_live(inum)? {
            return Ok(None);
        }
        if block < 0 || block as usize >= PTR_COUNT {
            return Ok(None);
        }
        let inode = self.read_inode(inum)?;
        let block_idx = inode.ptr[block as usize];
        if block_idx == -1 {
            return Ok(None);
        }
        if !bitmap::test(&self.device, BLOCK_BITMAP_START, block_idx as u32)? {
            return Ok(None);
        }
        let bytes = self
            .device
            .read_at(layout::block_offset(block_idx), layout::BLOCK_SIZE as usize)?;
        Ok(Some(bytes.into_boxed_slice()))
    }

    // ---- §4.4.4 write ----------------------------------------------------

    /// `write(inum, block, data[4096]) -> code` (§4.4.4): allocate-only,
    /// append-style writes to a not-yet-backed slot. `data` is copied
    /// verbatim if it is exactly [`layout::BLOCK_SIZE`] bytes; shorter
    /// payloads are zero-padded and longer ones truncated, since the wire
    /// protocol does not carry an explicit payload length (an
    /// implementation decision recorded in `DESIGN.md`).
    pub fn write(&mut self, inum: i32, block: i32, data: &[u8]) -> Result<bool> {
        if !Self::inum_in_range(inum) || !self.inum_live(inum)? {
            return Ok(false);
        }
        let mut inode = self.read_inode(inum)?;
        if inode.is_directory() {
            return Ok(false);
        }
        if block < 0 || block as usize >= PTR_COUNT {
            return Ok(false);
        }
        if inode.ptr[block as usize] != -1 {
            return Ok(false);
        }
        let new_block = match bitmap::first_free(&self.device, BLOCK_BITMAP_START)? {
            Some(idx) => idx,
            None => return Ok(false),
        };
        bitmap::set(&mut self.device, BLOCK_BITMAP_START, new_block, true)?;

        let mut payload = [0u8; layout::BLOCK_SIZE as usize];
        let n = data.len().min(payload.len());
        payload[..n].copy_from_slice(&data[..n]);
        self.device
            .write_at(layout::block_offset(new_block as i32), &payload)?;

        inode.ptr[block as usize] = new_block as i32;
        inode.num_blocks += 1;
        inode.size += layout::BLOCK_SIZE as i32;
        self.write_inode(inum, &inode)?;

        Ok(true)
    }

    // ---- §4.4.5 creat ----------------------------------------------------

    /// `creat(pinum, type, name) -> code` (§4.4.5).
    pub fn creat(&mut self, pinum: i32, file_type: i32, name: &[u8]) -> Result<bool> {
        if !Self::inum_in_range(pinum) || !self.inum_live(pinum)? {
            return Ok(false);
        }
        let mut parent = self.read_inode(pinum)?;
        if !parent.is_directory() {
            return Ok(false);
        }
        let kind = match FileKind::from_i32(file_type) {
            Some(k) => k,
            None => return Ok(false),
        };
        let free_slot = match parent.ptr.iter().position(|&p| p == -1) {
            Some(i) => i,
            None => return Ok(false),
        };
        let new_inum = match bitmap::first_free(&self.device, INODE_BITMAP_START)? {
            Some(i) => i as i32,
            None => return Ok(false),
        };
        let entry = match DirEntry::new(new_inum, name) {
            Ok(e) => e,
            Err(_) => return Ok(false),
        };

        // Reserve every data block this request could need up front: one
        // for the directory-entry block, plus two more for a new
        // directory's "." and ".." blocks. Checking all of them before
        // marking or writing anything means a refusal on exhaustion never
        // leaves an orphaned inode behind (no parent ever points to it) or
        // a directory entry whose target has no "." / ".." blocks (I4).
        let blocks_needed = if matches!(kind, FileKind::Directory) { 3 } else { 1 };
        let blocks = match self.find_n_free_blocks(blocks_needed)? {
            Some(b) => b,
            None => return Ok(false),
        };

        bitmap::set(&mut self.device, INODE_BITMAP_START, new_inum as u32, true)?;
        for &b in &blocks {
            bitmap::set(&mut self.device, BLOCK_BITMAP_START, b, true)?;
        }

        let entry_block = blocks[0] as i32;
        self.write_dirent(entry_block, &entry)?;

        // §9 Open Question 4: the reference server writes the new inode's
        // header twice (once empty, once final); only the final,
        // authoritative state is observable, so we construct it directly
        // instead of reproducing the intermediate write.
        let mut new_inode = RawInode::new(kind);
        if matches!(kind, FileKind::Directory) {
            let dot_block = blocks[1] as i32;
            let dotdot_block = blocks[2] as i32;
            self.write_dirent(dot_block, &DirEntry::new(new_inum, b".")?)?;
            self.write_dirent(dotdot_block, &DirEntry::new(pinum, b"..")?)?;
            new_inode.ptr[0] = dot_block;
            new_inode.ptr[1] = dotdot_block;
            new_inode.size = 512;
            new_inode.num_blocks = 1;
        }
        self.write_inode(new_inum, &new_inode)?;

        parent.ptr[free_slot] = entry_block;
        parent.size += layout::DIRENT_SIZE as i32;
        self.write_inode(pinum, &parent)?;

        Ok(true)
    }

    // ---- §4.4.6 unlink ----------------------------------------------------

    /// `unlink(pinum, name) -> code` (§4.4.6).
    pub fn unlink(&mut self, pinum: i32, name: &[u8]) -> Result<bool> {
        if !Self::inum_in_range(pinum) || !self.inum_live(pinum)? {
            return Ok(false);
        }
        let mut parent = self.read_inode(pinum)?;
        if !parent.is_directory() {
            return Ok(false);
        }
        if name == b"." || name == b".." {
            // "." and ".." are synthetic back-references creat/reset_fs
            // bake into every directory, not independently removable
            // entries: "." resolves to this very directory's own inode,
            // and ".." to the parent's. Unlinking either would clear the
            // bitmap bit of a directory that's still live and reachable
            // through another path — e.g. unlink(0, ".") would clear
            // root's own bit (root's "." points to itself), permanently
            // bricking the image (I1, P4).
            return Ok(false);
        }
        let (child_inum, slot, _entry_block) = match self.find_entry(&parent, name)? {
            Some(found) => found,
            // Unlinking an absent name is a no-op success (§4.4.6, R4).
            None => return Ok(true),
        };

        let child = self.read_inode(child_inum)?;
        if child.is_directory() && child.num_blocks > 2 {
            // Non-empty directory: refuse, image unchanged.
            return Ok(false);
        }

        bitmap::set(&mut self.device, INODE_BITMAP_START, child_inum as u32, false)?;

        parent.ptr[slot] = -1;
        parent.size -= layout::DIRENT_SIZE as i32;
        self.write_inode(pinum, &parent)?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, remove_dir_all, remove_file};
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push(format!("target/test-images-fs-{}", name));
        if path.exists() {
            remove_dir_all(&path).unwrap();
        }
        create_dir_all(&path).unwrap();
        path.push("img");
        path
    }

    fn fresh(name: &str) -> (FileSystem, PathBuf) {
        let path = scratch_path(name);
        (FileSystem::open(&path).unwrap(), path)
    }

    #[test]
    fn root_is_initialized_per_spec() {
        let (fs, path) = fresh("root-init");
        let st = fs.stat(0).unwrap().unwrap();
        assert_eq!(st.file_type, 0);
        assert_eq!(st.size, 512);
        assert_eq!(st.num_blocks, 1);
        assert_eq!(fs.lookup(0, b".").unwrap(), 0);
        assert_eq!(fs.lookup(0, b"..").unwrap(), 0);
        remove_file(&path).unwrap();
    }

    #[test]
    fn creat_lookup_stat_round_trip() {
        let (mut fs, path) = fresh("creat-roundtrip");
        assert!(fs.creat(0, 1, b"hello").unwrap());
        let i = fs.lookup(0, b"hello").unwrap();
        assert!(i >= 1);
        let st = fs.stat(i).unwrap().unwrap();
        assert_eq!(st, Stat { file_type: 1, size: 0, num_blocks: 0 });
        remove_file(&path).unwrap();
    }

    #[test]
    fn write_then_read_round_trips_exactly() {
        let (mut fs, path) = fresh("write-read");
        fs.creat(0, 1, b"hello").unwrap();
        let i = fs.lookup(0, b"hello").unwrap();

        let data = [b'A'; 4096];
        assert!(fs.write(i, 0, &data).unwrap());
        let back = fs.read(i, 0).unwrap().unwrap();
        assert_eq!(&*back, &data[..]);
        let st = fs.stat(i).unwrap().unwrap();
        assert_eq!(st, Stat { file_type: 1, size: 4096, num_blocks: 1 });
        remove_file(&path).unwrap();
    }

    #[test]
    fn write_to_backed_slot_is_refused() {
        let (mut fs, path) = fresh("write-twice");
        fs.creat(0, 1, b"hello").unwrap();
        let i = fs.lookup(0, b"hello").unwrap();
        assert!(fs.write(i, 0, &[b'A'; 4096]).unwrap());
        assert!(!fs.write(i, 0, &[b'B'; 4096]).unwrap());
        remove_file(&path).unwrap();
    }

    #[test]
    fn mkdir_has_dot_and_dotdot() {
        let (mut fs, path) = fresh("mkdir");
        assert!(fs.creat(0, 0, b"sub").unwrap());
        let j = fs.lookup(0, b"sub").unwrap();
        let st = fs.stat(j).unwrap().unwrap();
        assert_eq!(st, Stat { file_type: 0, size: 512, num_blocks: 1 });
        assert_eq!(fs.lookup(j, b".").unwrap(), j);
        assert_eq!(fs.lookup(j, b"..").unwrap(), 0);
        remove_file(&path).unwrap();
    }

    #[test]
    fn unlink_empty_dir_then_noop_on_absent() {
        let (mut fs, path) = fresh("unlink");
        fs.creat(0, 0, b"sub").unwrap();
        assert!(fs.unlink(0, b"sub").unwrap());
        assert_eq!(fs.lookup(0, b"sub").unwrap(), -1);
        // Unlinking an absent name is a no-op success.
        assert!(fs.unlink(0, b"sub").unwrap());
        remove_file(&path).unwrap();
    }

    #[test]
    fn unlink_nonempty_dir_refusal_is_unreachable_through_creat() {
        // §4.4.6 refuses unlink when the child directory's own num_blocks
        // field exceeds 2, but §4.4.5 never increments a parent's
        // num_blocks when a child entry is linked into it — so a
        // directory populated only through creat never actually reaches
        // num_blocks > 2. The refusal path exists on paper but this is
        // the only way these primitives can put a directory in front of
        // it; see the `num_blocks` discrepancy in DESIGN.md.
        let (mut fs, path) = fresh("unlink-nonempty");
        fs.creat(0, 0, b"sub").unwrap();
        let j = fs.lookup(0, b"sub").unwrap();
        fs.creat(j, 1, b"child").unwrap();
        assert!(fs.stat(j).unwrap().unwrap().num_blocks <= 2);
        assert!(fs.unlink(0, b"sub").unwrap());
        remove_file(&path).unwrap();
    }

    #[test]
    fn unlink_dot_and_dotdot_is_refused() {
        let (mut fs, path) = fresh("unlink-dot");
        // Root's own "." points back at inode 0; unlinking it would clear
        // root's live bit and brick the image if this weren't refused.
        assert!(!fs.unlink(0, b".").unwrap());
        assert!(!fs.unlink(0, b"..").unwrap());
        let st = fs.stat(0).unwrap().unwrap();
        assert_eq!(st, Stat { file_type: 0, size: 512, num_blocks: 1 });
        assert_eq!(fs.lookup(0, b".").unwrap(), 0);
        assert_eq!(fs.lookup(0, b"..").unwrap(), 0);

        assert!(fs.creat(0, 0, b"sub").unwrap());
        let sub = fs.lookup(0, b"sub").unwrap();
        assert!(!fs.unlink(sub, b".").unwrap());
        assert!(!fs.unlink(sub, b"..").unwrap());
        assert_eq!(fs.lookup(sub, b".").unwrap(), sub);
        assert_eq!(fs.lookup(sub, b"..").unwrap(), 0);
        remove_file(&path).unwrap();
    }

    #[test]
    fn creat_full_parent_is_refused() {
        let (mut fs, path) = fresh("full-parent");
        for i in 0..10 {
            assert!(fs.creat(0, 1, format!("f{}", i).as_bytes()).unwrap());
        }
        assert!(!fs.creat(0, 1, b"overflow").unwrap());
        remove_file(&path).unwrap();
    }

    #[test]
    fn creat_directory_on_block_exhaustion_leaves_no_trace() {
        // Leave exactly one free block (besides root's own "." and "..",
        // already at indices 0 and 1): enough for a regular file's single
        // entry block, not enough for a new directory's three (entry,
        // ".", "..").
        let (mut fs, path) = fresh("creat-atomic");
        for k in 3..NUM_BLOCKS {
            bitmap::set(&mut fs.device, BLOCK_BITMAP_START, k, true).unwrap();
        }

        assert!(!fs.creat(0, 0, b"sub").unwrap());
        // No orphaned inode: the candidate inode slot is still free.
        assert!(!bitmap::test(&fs.device, INODE_BITMAP_START, 1).unwrap());
        // No dangling parent entry either.
        assert_eq!(fs.lookup(0, b"sub").unwrap(), -1);
        let st = fs.stat(0).unwrap().unwrap();
        assert_eq!(st, Stat { file_type: 0, size: 512, num_blocks: 1 });
        // The sole remaining free block (index 2) is untouched.
        assert!(!bitmap::test(&fs.device, BLOCK_BITMAP_START, 2).unwrap());

        // A regular file only needs that one block and still succeeds.
        assert!(fs.creat(0, 1, b"file").unwrap());
        let f = fs.lookup(0, b"file").unwrap();
        assert_eq!(fs.stat(f).unwrap().unwrap(), Stat { file_type: 1, size: 0, num_blocks: 0 });
        remove_file(&path).unwrap();
    }

    #[test]
    fn out_of_range_inums_are_refused() {
        let (mut fs, path) = fresh("oob-inum");
        assert_eq!(fs.lookup(-1, b"x").unwrap(), -1);
        assert_eq!(fs.lookup(NUM_INODES as i32, b"x").unwrap(), -1);
        assert!(fs.stat(-1).unwrap().is_none());
        assert!(fs.read(-1, 0).unwrap().is_none());
        assert!(!fs.write(-1, 0, &[0; 4096]).unwrap());
        assert!(!fs.creat(-1, 1, b"x").unwrap());
        assert!(!fs.unlink(-1, b"x").unwrap());
        remove_file(&path).unwrap();
    }

    #[test]
    fn read_out_of_range_block_is_refused() {
        let (fs, path) = fresh("oob-block");
        assert!(fs.read(0, 10).unwrap().is_none());
        assert!(fs.read(0, -1).unwrap().is_none());
        remove_file(&path).unwrap();
    }

    #[test]
    fn image_survives_reopen() {
        let path = scratch_path("reopen");
        {
            let mut fs = FileSystem::open(&path).unwrap();
            fs.creat(0, 1, b"hello").unwrap();
            fs.flush().unwrap();
        }
        let fs = FileSystem::open(&path).unwrap();
        assert!(fs.lookup(0, b"hello").unwrap() >= 1);
        remove_file(&path).unwrap();
    }
}
