//! On-disk layout, error types, and the backing-store primitives the
//! file-system layer (`mfsd-server`) builds on top of.
//!
//! This crate owns everything positional: the fixed byte offsets of the two
//! bitmaps, the inode table, and the data region (`layout`), the codecs for
//! the 52-byte inode record and the 256-byte directory entry (`types`), the
//! bitmap test/set/first-free primitives (`bitmap`), and the memory-mapped
//! image file itself (`device`). None of it knows what a `lookup` or a
//! `creat` is — that belongs to the crate built on top of this one.

#![deny(missing_docs)]

pub mod bitmap;
pub mod device;
pub mod error;
pub mod layout;
pub mod types;

pub use device::Device;
pub use error::{Error, Result};
