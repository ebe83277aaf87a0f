//! Error type shared by every layer of this workspace that touches the
//! backing image directly.
//!
//! Only genuine storage/layout faults belong here. A file system operation
//! that is merely *refused* by the data-model invariants (an out-of-range
//! inode, a write to an already-backed slot, a non-empty directory on
//! unlink, ...) is not an error: it is a normal `Ok` value carrying the
//! wire protocol's `-1` sentinel. See `mfsd_server::fs` for where that line
//! is drawn.

use std::io;
use thiserror::Error;

/// Errors produced by the image backing store and the codecs built on it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure opening, sizing, or flushing the backing image file.
    #[error("I/O error on backing image")]
    Io(#[from] io::Error),

    /// An existing image file was opened, but its size does not match the
    /// fixed image size this spec mandates.
    #[error("image size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch {
        /// Size the image must be.
        expected: u64,
        /// Size the image actually is.
        found: u64,
    },

    /// A caller tried to address a byte range that falls outside the image.
    #[error("access past the end of the image: offset {offset} + len {len} > {image_size}")]
    OutOfRange {
        /// Starting byte offset of the attempted access.
        offset: u64,
        /// Number of bytes requested.
        len: usize,
        /// Total size of the image.
        image_size: u64,
    },

    /// A directory entry name did not fit in the 252-byte name field
    /// (251 bytes of content plus a NUL terminator).
    #[error("name is too long to fit in a directory entry (max {max} bytes including the NUL terminator)")]
    NameTooLong {
        /// Maximum number of bytes a name may occupy, NUL included.
        max: usize,
    },
}

/// Convenience alias for `Result`s bottoming out in [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
