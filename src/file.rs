//! File block addressing: mapping logical block indices onto disk blocks
//! through the twelve direct pointers and the single-indirect block, and the
//! grow/shrink paths built on that mapping.

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::bitmap::{alloc_block, free_block, Bitmap};
use crate::block_dev::BlockDevice;
use crate::config::{BLOCK_SIZE, DIRECT_BLOCKS, MAX_FILE_BLOCKS, PTRS_PER_BLOCK};
use crate::error::{FsError, Result};
use crate::structs::{Inode, Superblock};

fn read_ptr(buf: &[u8; BLOCK_SIZE], slot: usize) -> u32 {
    LittleEndian::read_u32(&buf[slot * 4..slot * 4 + 4])
}

fn write_ptr(buf: &mut [u8; BLOCK_SIZE], slot: usize, block_id: u32) {
    LittleEndian::write_u32(&mut buf[slot * 4..slot * 4 + 4], block_id);
}

/// Disk block backing logical block `index` of `inode`, or 0 if that index
/// was never allocated.
pub fn block_at<D: BlockDevice>(device: &D, inode: &Inode, index: u32) -> Result<u32> {
    let index = index as usize;
    if index < DIRECT_BLOCKS {
        return Ok(inode.blocks[index]);
    }
    if index >= MAX_FILE_BLOCKS {
        return Err(FsError::TooLarge);
    }
    let indirect = inode.blocks[DIRECT_BLOCKS];
    if indirect == 0 {
        return Ok(0);
    }
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(indirect, &mut buf)?;
    Ok(read_ptr(&buf, index - DIRECT_BLOCKS))
}

/// Allocates a data block and wires it in as logical block `index`. Crossing
/// into the indirect range at index 12 also allocates the index block. The
/// pointer update is persisted (indirect slots on disk, direct slots in the
/// caller's inode, which the caller writes back).
pub fn grow_one<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    inode: &mut Inode,
    index: u32,
) -> Result<u32> {
    let index = index as usize;
    if index >= MAX_FILE_BLOCKS {
        return Err(FsError::TooLarge);
    }
    let block_id = alloc_block(device, superblock, bitmap)?;
    if index < DIRECT_BLOCKS {
        inode.blocks[index] = block_id;
        return Ok(block_id);
    }

    let slot = index - DIRECT_BLOCKS;
    let mut buf = [0u8; BLOCK_SIZE];
    if inode.blocks[DIRECT_BLOCKS] == 0 {
        let indirect = match alloc_block(device, superblock, bitmap) {
            Ok(id) => id,
            Err(e) => {
                free_block(device, superblock, bitmap, block_id)?;
                return Err(e);
            }
        };
        inode.blocks[DIRECT_BLOCKS] = indirect;
        write_ptr(&mut buf, slot, block_id);
        device.write_block(indirect, &buf)?;
    } else {
        let indirect = inode.blocks[DIRECT_BLOCKS];
        device.read_block(indirect, &mut buf)?;
        write_ptr(&mut buf, slot, block_id);
        device.write_block(indirect, &buf)?;
    }
    Ok(block_id)
}

/// Releases every data block at logical index >= `new_count`, clearing the
/// now-unused pointers. When the shrink drops back into the direct range the
/// indirect block itself is released too.
pub fn shrink_to<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    inode: &mut Inode,
    new_count: u32,
    old_count: u32,
) -> Result<()> {
    let new_count = new_count as usize;
    let old_count = old_count as usize;
    if new_count >= old_count {
        return Ok(());
    }
    debug!("shrink: {} -> {} blocks", old_count, new_count);

    if old_count > DIRECT_BLOCKS && inode.blocks[DIRECT_BLOCKS] != 0 {
        let indirect = inode.blocks[DIRECT_BLOCKS];
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(indirect, &mut buf)?;
        let first_slot = new_count.saturating_sub(DIRECT_BLOCKS);
        for slot in first_slot..(old_count - DIRECT_BLOCKS).min(PTRS_PER_BLOCK) {
            let block_id = read_ptr(&buf, slot);
            if block_id != 0 {
                free_block(device, superblock, bitmap, block_id)?;
                write_ptr(&mut buf, slot, 0);
            }
        }
        if new_count <= DIRECT_BLOCKS {
            free_block(device, superblock, bitmap, indirect)?;
            inode.blocks[DIRECT_BLOCKS] = 0;
        } else {
            device.write_block(indirect, &buf)?;
        }
    }

    for index in new_count..old_count.min(DIRECT_BLOCKS) {
        if inode.blocks[index] != 0 {
            free_block(device, superblock, bitmap, inode.blocks[index])?;
            inode.blocks[index] = 0;
        }
    }
    Ok(())
}

/// Frees every block reachable from the in-memory inode: the direct
/// pointers, every allocated indirect slot, and the indirect block itself.
/// Works on a half-built inode whose record was never written back, which is
/// what the ingest failure path relies on.
pub fn release_blocks<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    inode: &mut Inode,
) -> Result<()> {
    for index in 0..DIRECT_BLOCKS {
        if inode.blocks[index] != 0 {
            free_block(device, superblock, bitmap, inode.blocks[index])?;
            inode.blocks[index] = 0;
        }
    }
    let indirect = inode.blocks[DIRECT_BLOCKS];
    if indirect != 0 {
        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(indirect, &mut buf)?;
        for slot in 0..PTRS_PER_BLOCK {
            let block_id = read_ptr(&buf, slot);
            if block_id != 0 {
                free_block(device, superblock, bitmap, block_id)?;
            }
        }
        free_block(device, superblock, bitmap, indirect)?;
        inode.blocks[DIRECT_BLOCKS] = 0;
    }
    Ok(())
}
