//! The directory codec: fixed 264-byte entry records packed into a
//! directory's direct data blocks, fifteen per block.
//!
//! A scan walks the direct blocks in order and, within a block, stops at the
//! first record whose `inode` and `rec_len` are both zero (the unformatted
//! tail). A record with `inode == 0` but a nonzero `rec_len` is a tombstone
//! left by a removal and may be reused by the next insert. Directories never
//! spill into the indirect block, which caps them at 180 entries.

use crate::bitmap::{alloc_block, Bitmap};
use crate::block_dev::BlockDevice;
use crate::config::{
    BLOCK_SIZE, DIRECT_BLOCKS, DIR_ENTRY_SIZE, DOTDOT_NAME, DOT_NAME, ENTRIES_PER_BLOCK,
};
use crate::error::{FsError, Result};
use crate::structs::{DirEntry, FileType, Inode, Superblock};

/// Looks a name up among the live entries of `dir`.
pub fn dir_lookup<D: BlockDevice>(
    device: &D,
    dir: &Inode,
    name: &[u8],
) -> Result<Option<u32>> {
    let mut found = None;
    scan(device, dir, |entry| {
        if entry.is_live() && entry.matches(name) {
            found = Some(entry.inode);
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

/// Live entries of `dir` in scan order, `.` and `..` included.
pub fn dir_entries<D: BlockDevice>(device: &D, dir: &Inode) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    scan(device, dir, |entry| {
        if entry.is_live() {
            entries.push(*entry);
        }
        Ok(true)
    })?;
    Ok(entries)
}

/// True when every live entry is `.` or `..`.
pub fn dir_is_empty<D: BlockDevice>(device: &D, dir: &Inode) -> Result<bool> {
    let mut empty = true;
    scan(device, dir, |entry| {
        if entry.is_live() && !entry.is_dot_or_dotdot() {
            empty = false;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(empty)
}

/// Inserts an entry into `dir`, reusing the first tombstone or appending at
/// the end of the records. A fresh direct block is allocated once the
/// existing ones are full; past twelve blocks the directory cannot grow.
/// The caller persists `dir` afterwards (its pointers may have changed).
pub fn dir_insert<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    dir: &mut Inode,
    entry: &DirEntry,
) -> Result<()> {
    let mut buf = [0u8; BLOCK_SIZE];
    for index in 0..DIRECT_BLOCKS {
        let block_id = dir.blocks[index];
        if block_id == 0 {
            let block_id = alloc_block(device, superblock, bitmap)?;
            dir.blocks[index] = block_id;
            buf.fill(0);
            entry.encode(&mut buf[..DIR_ENTRY_SIZE])?;
            return device.write_block(block_id, &buf);
        }
        device.read_block(block_id, &mut buf)?;
        for slot in 0..ENTRIES_PER_BLOCK {
            let offset = slot * DIR_ENTRY_SIZE;
            let record = DirEntry::decode(&buf[offset..offset + DIR_ENTRY_SIZE])?;
            if !record.is_live() {
                entry.encode(&mut buf[offset..offset + DIR_ENTRY_SIZE])?;
                return device.write_block(block_id, &buf);
            }
        }
    }
    Err(FsError::TooLarge)
}

/// Removes the entry named `name`, tombstoning it in place: only the `inode`
/// field is zeroed, `rec_len` stays so later scans keep walking. Returns the
/// inode number the entry pointed at.
pub fn dir_remove<D: BlockDevice>(device: &D, dir: &Inode, name: &[u8]) -> Result<u32> {
    let mut removed = None;
    let mut buf = [0u8; BLOCK_SIZE];
    for index in 0..DIRECT_BLOCKS {
        let block_id = dir.blocks[index];
        if block_id == 0 {
            break;
        }
        device.read_block(block_id, &mut buf)?;
        for slot in 0..ENTRIES_PER_BLOCK {
            let offset = slot * DIR_ENTRY_SIZE;
            let entry = DirEntry::decode(&buf[offset..offset + DIR_ENTRY_SIZE])?;
            if entry.is_end() {
                break;
            }
            if entry.is_live() && entry.matches(name) {
                buf[offset..offset + 4].fill(0);
                device.write_block(block_id, &buf)?;
                removed = Some(entry.inode);
                break;
            }
        }
        if removed.is_some() {
            break;
        }
    }
    removed.ok_or(FsError::NotFound)
}

/// A freshly initialized directory block: `.` pointing at the directory
/// itself and `..` at its parent (the root points both at inode 1).
pub fn init_dir_block(own: u32, parent: u32) -> Result<[u8; BLOCK_SIZE]> {
    let mut buf = [0u8; BLOCK_SIZE];
    let dot = DirEntry::new(own, DOT_NAME, FileType::Directory)?;
    let dotdot = DirEntry::new(parent, DOTDOT_NAME, FileType::Directory)?;
    dot.encode(&mut buf[..DIR_ENTRY_SIZE])?;
    dotdot.encode(&mut buf[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE])?;
    Ok(buf)
}

/// Walks the live-and-tombstone records of `dir` in scan order. The callback
/// returns `false` to stop early. Scanning ends at the first end-of-records
/// marker of a block; a zero direct pointer ends the directory.
fn scan<D, F>(device: &D, dir: &Inode, mut visit: F) -> Result<()>
where
    D: BlockDevice,
    F: FnMut(&DirEntry) -> Result<bool>,
{
    let mut buf = [0u8; BLOCK_SIZE];
    for index in 0..DIRECT_BLOCKS {
        let block_id = dir.blocks[index];
        if block_id == 0 {
            break;
        }
        device.read_block(block_id, &mut buf)?;
        for slot in 0..ENTRIES_PER_BLOCK {
            let offset = slot * DIR_ENTRY_SIZE;
            let entry = DirEntry::decode(&buf[offset..offset + DIR_ENTRY_SIZE])?;
            if entry.is_end() {
                break;
            }
            if !visit(&entry)? {
                return Ok(());
            }
        }
    }
    Ok(())
}
