//! The block bitmap: one bit per block of the image, packed into block 1.
//!
//! A mounted filesystem keeps the bitmap in memory and writes it back,
//! together with the superblock counters, after every allocate or free, so
//! the pair stays coherent on disk.

use crate::block_dev::BlockDevice;
use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};
use crate::structs::Superblock;
use crate::superblock::write_superblock;

pub struct Bitmap {
    bytes: Box<[u8; BLOCK_SIZE]>,
}

impl Bitmap {
    pub fn new() -> Self {
        Bitmap {
            bytes: Box::new([0u8; BLOCK_SIZE]),
        }
    }

    pub fn load<D: BlockDevice>(device: &D, superblock: &Superblock) -> Result<Self> {
        let mut bitmap = Bitmap::new();
        device.read_block(superblock.bitmap_block, &mut bitmap.bytes)?;
        Ok(bitmap)
    }

    pub fn store<D: BlockDevice>(&self, device: &D, superblock: &Superblock) -> Result<()> {
        device.write_block(superblock.bitmap_block, &self.bytes)
    }

    pub fn is_set(&self, block_id: u32) -> bool {
        self.bytes[block_id as usize / 8] & (1 << (block_id % 8)) != 0
    }

    pub fn set(&mut self, block_id: u32) {
        self.bytes[block_id as usize / 8] |= 1 << (block_id % 8);
    }

    pub fn clear(&mut self, block_id: u32) {
        self.bytes[block_id as usize / 8] &= !(1 << (block_id % 8));
    }

    /// First zero bit, scanning from block 0 upward. The reserved blocks are
    /// marked used at format time and never come back.
    pub fn first_free(&self, blocks_count: u32) -> Option<u32> {
        (0..blocks_count).find(|&id| !self.is_set(id))
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Bitmap::new()
    }
}

/// Allocates the lowest-numbered free block, persisting the bitmap and the
/// superblock before returning its ID.
pub fn alloc_block<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
) -> Result<u32> {
    let block_id = bitmap
        .first_free(superblock.blocks_count)
        .ok_or(FsError::OutOfBlocks)?;
    bitmap.set(block_id);
    superblock.free_blocks_count -= 1;
    bitmap.store(device, superblock)?;
    write_superblock(device, superblock)?;
    Ok(block_id)
}

/// Returns a block to the free pool. Out-of-range or already-free IDs are
/// ignored, which makes releasing a half-built pointer chain safe.
pub fn free_block<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    block_id: u32,
) -> Result<()> {
    if block_id >= superblock.blocks_count || !bitmap.is_set(block_id) {
        return Ok(());
    }
    bitmap.clear(block_id);
    superblock.free_blocks_count += 1;
    bitmap.store(device, superblock)?;
    write_superblock(device, superblock)
}
