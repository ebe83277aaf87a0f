//! File-system primitives and UDP request dispatch, built on top of the
//! `mfsd-api` image/bitmap/codec layer.

pub mod dispatch;
pub mod fs;

pub use fs::FileSystem;
