//! msfs keeps an entire directory tree inside a single host file, laid out
//! like a classical Unix disk: superblock, block bitmap, packed inode table,
//! then data blocks addressed through twelve direct pointers and one
//! single-indirect block per inode.
//!
//! Layers, from bottom to top:
//! 1. Block device: whole-block I/O over the image file.       | `block_dev`
//! 2. Bitmap: free/used state of every block.                  | `bitmap`
//! 3. Inode table: packed 128-byte records, 1-indexed.         | `inode`
//! 4. Directory/Path: fixed-size entry records and resolution. | `directory`, `path`
//! 5. File addressing: direct + single-indirect block mapping. | `file`
//! 6. FileSystem: format, mount, and the namespace operations. | `fs`
//!
//! Single-user and single-threaded by design: one mounted instance owns the
//! image for its lifetime, and every operation runs to completion before the
//! next begins.

mod bitmap;
mod block_dev;
mod config;
mod directory;
mod error;
mod file;
mod fs;
mod inode;
mod path;
mod structs;
mod superblock;

pub use block_dev::{BlockDevice, ImageDisk};
pub use config::*;
pub use error::FsError as Error;
pub use error::Result;
pub use fs::FileSystem;
pub use structs::{DirEntry, FileType, Inode, Superblock};
