//! Access to the packed inode table. Inode `k` lives in block
//! `first_inode_block + (k - 1) / 32` at offset `((k - 1) % 32) * 128`.
//! There is no inode bitmap: a record with `links_count == 0` is free.

use log::debug;

use crate::bitmap::Bitmap;
use crate::block_dev::BlockDevice;
use crate::config::{BLOCK_SIZE, INODES_PER_BLOCK, INODE_SIZE};
use crate::error::{FsError, Result};
use crate::file::release_blocks;
use crate::structs::{Inode, Superblock};
use crate::superblock::write_superblock;

fn locate(superblock: &Superblock, inode_num: u32) -> (u32, usize) {
    let index = inode_num - 1;
    let block_id = superblock.first_inode_block + index / INODES_PER_BLOCK as u32;
    let offset = (index as usize % INODES_PER_BLOCK) * INODE_SIZE;
    (block_id, offset)
}

pub fn read_inode<D: BlockDevice>(
    device: &D,
    superblock: &Superblock,
    inode_num: u32,
) -> Result<Inode> {
    if inode_num == 0 || inode_num > superblock.inodes_count {
        return Err(FsError::NotFound);
    }
    let (block_id, offset) = locate(superblock, inode_num);
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    Inode::decode(&buf[offset..offset + INODE_SIZE])
}

pub fn write_inode<D: BlockDevice>(
    device: &D,
    superblock: &Superblock,
    inode_num: u32,
    inode: &Inode,
) -> Result<()> {
    if inode_num == 0 || inode_num > superblock.inodes_count {
        return Err(FsError::NotFound);
    }
    let (block_id, offset) = locate(superblock, inode_num);
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    inode.encode(&mut buf[offset..offset + INODE_SIZE])?;
    device.write_block(block_id, &buf)
}

/// First-fit selection of a free inode. Only the superblock counter changes
/// here; the record itself stays zeroed until the caller writes it with a
/// nonzero `links_count`.
pub fn alloc_inode<D: BlockDevice>(device: &D, superblock: &mut Superblock) -> Result<u32> {
    for inode_num in 1..=superblock.inodes_count {
        if read_inode(device, superblock, inode_num)?.links_count == 0 {
            superblock.free_inodes_count -= 1;
            write_superblock(device, superblock)?;
            return Ok(inode_num);
        }
    }
    Err(FsError::OutOfInodes)
}

/// Releases an inode: frees all its data blocks (and the indirect block, if
/// any), zeroes the record, and returns it to the free pool.
pub fn free_inode<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    inode_num: u32,
) -> Result<()> {
    let mut inode = read_inode(device, superblock, inode_num)?;
    debug!(
        "free inode {} ({} data blocks)",
        inode_num,
        inode.block_count()
    );
    release_blocks(device, superblock, bitmap, &mut inode)?;
    write_inode(device, superblock, inode_num, &Inode::ZERO)?;
    superblock.free_inodes_count += 1;
    write_superblock(device, superblock)
}
