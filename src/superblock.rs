use crate::block_dev::BlockDevice;
use crate::config::{BLOCK_SIZE, MAGIC, SUPERBLOCK_BLOCK};
use crate::error::{FsError, Result};
use crate::structs::Superblock;

/// Loads the superblock from block 0 and validates it. A wrong magic (or a
/// block size this build cannot address) means the file is not one of our
/// images.
pub fn read_superblock<D: BlockDevice>(device: &D) -> Result<Superblock> {
    let mut buf = [0u8; BLOCK_SIZE];
    device.read_block(SUPERBLOCK_BLOCK, &mut buf)?;
    let superblock = Superblock::decode(&buf)?;
    if superblock.magic != MAGIC || superblock.block_size != BLOCK_SIZE as u32 {
        return Err(FsError::BadMagic);
    }
    Ok(superblock)
}

/// Persists the superblock and flushes the device. Every mutating operation
/// funnels through here at least once, which gives the image its
/// write-through durability.
pub fn write_superblock<D: BlockDevice>(device: &D, superblock: &Superblock) -> Result<()> {
    let mut buf = [0u8; BLOCK_SIZE];
    superblock.encode(&mut buf)?;
    device.write_block(SUPERBLOCK_BLOCK, &buf)?;
    device.flush()
}
