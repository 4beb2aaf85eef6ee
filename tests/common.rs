//! Common utilities for tests
#![allow(unused)]

use std::sync::{Arc, Mutex};

use msfs::*;

/// An in-memory block device. Same whole-block contract as the image file,
/// no host I/O.
#[derive(Debug)]
pub struct RamDisk {
    blocks: Mutex<Vec<u8>>,
    num_blocks: u32,
}

impl RamDisk {
    pub fn new(num_blocks: u32) -> Self {
        RamDisk {
            blocks: Mutex::new(vec![0u8; num_blocks as usize * BLOCK_SIZE]),
            num_blocks,
        }
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "block out of range",
            )));
        }
        let start = block_id as usize * BLOCK_SIZE;
        let blocks = self.blocks.lock().unwrap();
        buf.copy_from_slice(&blocks[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "block out of range",
            )));
        }
        let start = block_id as usize * BLOCK_SIZE;
        let mut blocks = self.blocks.lock().unwrap();
        blocks[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A freshly formatted filesystem over a RAM disk of `num_blocks` blocks.
pub fn fresh_fs(num_blocks: u32) -> FileSystem<RamDisk> {
    FileSystem::format(Arc::new(RamDisk::new(num_blocks))).unwrap()
}

/// Writes `data` into the image as a regular file at `path`.
pub fn put_file(fs: &mut FileSystem<RamDisk>, path: &str, data: &[u8]) {
    let mut reader = std::io::Cursor::new(data);
    fs.ingest(path, &mut reader, data.len() as u64).unwrap();
}

/// Reads the whole regular file at `path` back out of the image.
pub fn get_file<D: BlockDevice>(fs: &FileSystem<D>, path: &str) -> Vec<u8> {
    let mut out = Vec::new();
    fs.extract(path, &mut out).unwrap();
    out
}
