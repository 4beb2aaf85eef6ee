//! The filesystem object and its namespace operations. Methods orchestrate
//! the lower layers; every mutating operation leaves the superblock, bitmap,
//! and inode table consistent before it returns.

use std::io::{self, Read, Write};
use std::sync::Arc;

use log::{debug, info};

use crate::bitmap::{alloc_block, Bitmap};
use crate::block_dev::BlockDevice;
use crate::config::{BLOCK_SIZE, MAX_FILE_SIZE, MAX_NAME_LEN, ROOT_INODE};
use crate::directory::{
    dir_entries, dir_insert, dir_is_empty, dir_lookup, dir_remove, init_dir_block,
};
use crate::error::{FsError, Result};
use crate::file::{block_at, grow_one, release_blocks, shrink_to};
use crate::inode::{alloc_inode, free_inode, read_inode, write_inode};
use crate::path::{resolve, split_path};
use crate::structs::{DirEntry, FileType, Inode, Superblock};
use crate::superblock::{read_superblock, write_superblock};

pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    superblock: Superblock,
    bitmap: Bitmap,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Formats the device into a blank filesystem: superblock, bitmap with
    /// the reserved blocks marked, a zeroed inode table, and a root
    /// directory holding `.` and `..`.
    pub fn format(device: Arc<D>) -> Result<Self> {
        let mut superblock = Superblock::new(device.num_blocks())?;
        let mut bitmap = Bitmap::new();
        for block_id in 0..superblock.first_data_block {
            bitmap.set(block_id);
        }

        let zero = [0u8; BLOCK_SIZE];
        for block_id in superblock.first_inode_block..superblock.first_data_block {
            device.write_block(block_id, &zero)?;
        }
        bitmap.store(&*device, &superblock)?;
        write_superblock(&*device, &superblock)?;

        let root_block = alloc_block(&*device, &mut superblock, &mut bitmap)?;
        device.write_block(root_block, &init_dir_block(ROOT_INODE, ROOT_INODE)?)?;
        let mut root = Inode::new(FileType::Directory);
        root.links_count = 1;
        root.blocks[0] = root_block;
        write_inode(&*device, &superblock, ROOT_INODE, &root)?;

        info!(
            "formatted image: {} blocks, {} inodes, data from block {}",
            superblock.blocks_count, superblock.inodes_count, superblock.first_data_block
        );
        Ok(FileSystem {
            device,
            superblock,
            bitmap,
        })
    }

    /// Mounts an existing image: validates the superblock and loads the
    /// bitmap. The instance owns the device until it is dropped.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        let bitmap = Bitmap::load(&*device, &superblock)?;
        info!(
            "mounted image: {} blocks, {} free",
            superblock.blocks_count, superblock.free_blocks_count
        );
        Ok(FileSystem {
            device,
            superblock,
            bitmap,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Inode record behind a path. Mostly useful to inspect sizes and link
    /// counts without going through `list`.
    pub fn stat(&self, path: &str) -> Result<Inode> {
        let inode_num = resolve(&*self.device, &self.superblock, path)?;
        read_inode(&*self.device, &self.superblock, inode_num)
    }

    /// Used and total blocks.
    pub fn usage(&self) -> (u32, u32) {
        (
            self.superblock.blocks_count - self.superblock.free_blocks_count,
            self.superblock.blocks_count,
        )
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let device = &*self.device;
        let (parent_path, name) = split_path(path);
        check_leaf_name(&name)?;
        let name = name.as_bytes();
        let parent_num = resolve(device, &self.superblock, &parent_path)?;
        let mut parent = read_inode(device, &self.superblock, parent_num)?;
        if !parent.is_directory() {
            return Err(FsError::NotADirectory);
        }
        if dir_lookup(device, &parent, name)?.is_some() {
            return Err(FsError::Exists);
        }

        let inode_num = alloc_inode(device, &mut self.superblock)?;
        let mut inode = Inode::new(FileType::Directory);
        inode.links_count = 1;
        if let Err(e) = commit_mkdir(
            device,
            &mut self.superblock,
            &mut self.bitmap,
            parent_num,
            &mut parent,
            inode_num,
            &mut inode,
            name,
        ) {
            let _ = dir_remove(device, &parent, name);
            discard_inode(
                device,
                &mut self.superblock,
                &mut self.bitmap,
                inode_num,
                &mut inode,
            );
            return Err(e);
        }
        debug!("mkdir {}: inode {}", path, inode_num);
        Ok(())
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let device = &*self.device;
        let inode_num = resolve(device, &self.superblock, path)?;
        let inode = read_inode(device, &self.superblock, inode_num)?;
        if !inode.is_directory() {
            return Err(FsError::NotADirectory);
        }
        if !dir_is_empty(device, &inode)? {
            return Err(FsError::NotEmpty);
        }
        let (parent_path, name) = split_path(path);
        let parent_num = resolve(device, &self.superblock, &parent_path)?;
        let parent = read_inode(device, &self.superblock, parent_num)?;
        // The root has no parent entry, so removing "/" dies right here.
        dir_remove(device, &parent, name.as_bytes())?;
        free_inode(device, &mut self.superblock, &mut self.bitmap, inode_num)?;
        debug!("rmdir {}: freed inode {}", path, inode_num);
        Ok(())
    }

    /// Creates a hard link to an existing inode. Directory targets are
    /// accepted, cycles and all; the resolver will not notice.
    pub fn link(&mut self, target: &str, link_path: &str) -> Result<()> {
        let device = &*self.device;
        let target_num = resolve(device, &self.superblock, target)?;
        let mut target_inode = read_inode(device, &self.superblock, target_num)?;
        let (parent_path, name) = split_path(link_path);
        check_leaf_name(&name)?;
        let name = name.as_bytes();
        let parent_num = resolve(device, &self.superblock, &parent_path)?;
        let mut parent = read_inode(device, &self.superblock, parent_num)?;
        if !parent.is_directory() {
            return Err(FsError::NotADirectory);
        }
        if dir_lookup(device, &parent, name)?.is_some() {
            return Err(FsError::Exists);
        }
        let entry = DirEntry::new(target_num, name, target_inode.file_type())?;
        dir_insert(
            device,
            &mut self.superblock,
            &mut self.bitmap,
            &mut parent,
            &entry,
        )?;
        write_inode(device, &self.superblock, parent_num, &parent)?;
        target_inode.links_count += 1;
        write_inode(device, &self.superblock, target_num, &target_inode)
    }

    /// Removes one directory entry. When the last link goes, the inode and
    /// all its data blocks are reclaimed.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let device = &*self.device;
        let (parent_path, name) = split_path(path);
        let parent_num = resolve(device, &self.superblock, &parent_path)?;
        let parent = read_inode(device, &self.superblock, parent_num)?;
        if !parent.is_directory() {
            return Err(FsError::NotADirectory);
        }
        let inode_num = dir_remove(device, &parent, name.as_bytes())?;
        let mut inode = read_inode(device, &self.superblock, inode_num)?;
        inode.links_count = inode.links_count.saturating_sub(1);
        if inode.links_count == 0 {
            free_inode(device, &mut self.superblock, &mut self.bitmap, inode_num)?;
        } else {
            write_inode(device, &self.superblock, inode_num, &inode)?;
        }
        debug!("unlink {}: inode {}", path, inode_num);
        Ok(())
    }

    /// Copies `len` bytes from `source` into a new regular file at `path`.
    /// On any failure during the copy, every block allocated for the file,
    /// the inode, and the parent's new entry are all released again.
    pub fn ingest<R: Read>(&mut self, path: &str, source: &mut R, len: u64) -> Result<()> {
        if len > MAX_FILE_SIZE as u64 {
            return Err(FsError::TooLarge);
        }
        let device = &*self.device;
        let (parent_path, name) = split_path(path);
        check_leaf_name(&name)?;
        let name = name.as_bytes();
        let parent_num = resolve(device, &self.superblock, &parent_path)?;
        let mut parent = read_inode(device, &self.superblock, parent_num)?;
        if !parent.is_directory() {
            return Err(FsError::NotADirectory);
        }
        if dir_lookup(device, &parent, name)?.is_some() {
            return Err(FsError::Exists);
        }

        let inode_num = alloc_inode(device, &mut self.superblock)?;
        let mut inode = Inode::new(FileType::Regular);
        inode.links_count = 1;
        if let Err(e) = commit_ingest(
            device,
            &mut self.superblock,
            &mut self.bitmap,
            parent_num,
            &mut parent,
            inode_num,
            &mut inode,
            name,
            source,
            len,
        ) {
            let _ = dir_remove(device, &parent, name);
            discard_inode(
                device,
                &mut self.superblock,
                &mut self.bitmap,
                inode_num,
                &mut inode,
            );
            return Err(e);
        }
        debug!("ingest {}: {} bytes into inode {}", path, len, inode_num);
        Ok(())
    }

    /// Streams a regular file's payload into `dest`, direct blocks first,
    /// then through the indirect block; the final block is cut at `size`.
    pub fn extract<W: Write>(&self, path: &str, dest: &mut W) -> Result<()> {
        let device = &*self.device;
        let inode_num = resolve(device, &self.superblock, path)?;
        let inode = read_inode(device, &self.superblock, inode_num)?;
        if !inode.is_regular() {
            return Err(FsError::NotAFile);
        }
        let mut remaining = inode.size as usize;
        let mut buf = [0u8; BLOCK_SIZE];
        for index in 0..inode.block_count() {
            let block_id = block_at(device, &inode, index)?;
            if block_id == 0 {
                return Err(FsError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "file block unallocated",
                )));
            }
            device.read_block(block_id, &mut buf)?;
            let take = remaining.min(BLOCK_SIZE);
            dest.write_all(&buf[..take])?;
            remaining -= take;
        }
        Ok(())
    }

    /// Appends `count` bytes of the pattern `'A' + (i % 26)` to a regular
    /// file, filling the final partial block before growing.
    pub fn append(&mut self, path: &str, count: u64) -> Result<()> {
        let device = &*self.device;
        let inode_num = resolve(device, &self.superblock, path)?;
        let mut inode = read_inode(device, &self.superblock, inode_num)?;
        if !inode.is_regular() {
            return Err(FsError::NotAFile);
        }
        if inode.size as u64 + count > MAX_FILE_SIZE as u64 {
            return Err(FsError::TooLarge);
        }

        let mut blocks = inode.block_count();
        let tail = inode.size as usize % BLOCK_SIZE;
        let mut written = 0u64;
        let mut buf = [0u8; BLOCK_SIZE];

        if tail > 0 {
            let block_id = block_at(device, &inode, blocks - 1)?;
            device.read_block(block_id, &mut buf)?;
            let take = (count.min((BLOCK_SIZE - tail) as u64)) as usize;
            fill_pattern(&mut buf[tail..tail + take], written);
            device.write_block(block_id, &buf)?;
            written += take as u64;
        }
        while written < count {
            let take = (count - written).min(BLOCK_SIZE as u64) as usize;
            buf.fill(0);
            fill_pattern(&mut buf[..take], written);
            let block_id = grow_one(
                device,
                &mut self.superblock,
                &mut self.bitmap,
                &mut inode,
                blocks,
            )?;
            device.write_block(block_id, &buf)?;
            written += take as u64;
            blocks += 1;
        }
        inode.size += count as u32;
        write_inode(device, &self.superblock, inode_num, &inode)
    }

    /// Cuts `count` bytes off the end of a regular file, releasing every
    /// block past the new size. More than the file holds is an error, not a
    /// clamp.
    pub fn truncate(&mut self, path: &str, count: u64) -> Result<()> {
        let device = &*self.device;
        let inode_num = resolve(device, &self.superblock, path)?;
        let mut inode = read_inode(device, &self.superblock, inode_num)?;
        if !inode.is_regular() {
            return Err(FsError::NotAFile);
        }
        if count > inode.size as u64 {
            return Err(FsError::TooLarge);
        }
        let new_size = inode.size - count as u32;
        let old_blocks = inode.block_count();
        let new_blocks = new_size.div_ceil(BLOCK_SIZE as u32);
        shrink_to(
            device,
            &mut self.superblock,
            &mut self.bitmap,
            &mut inode,
            new_blocks,
            old_blocks,
        )?;
        inode.size = new_size;
        write_inode(device, &self.superblock, inode_num, &inode)
    }

    /// Names and sizes of a directory's entries in scan order, `.` and `..`
    /// left out.
    pub fn list(&self, path: &str) -> Result<Vec<(String, u32)>> {
        let device = &*self.device;
        let inode_num = resolve(device, &self.superblock, path)?;
        let inode = read_inode(device, &self.superblock, inode_num)?;
        if !inode.is_directory() {
            return Err(FsError::NotADirectory);
        }
        let mut listing = Vec::new();
        for entry in dir_entries(device, &inode)? {
            if entry.is_dot_or_dotdot() {
                continue;
            }
            let child = read_inode(device, &self.superblock, entry.inode)?;
            listing.push((
                String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                child.size,
            ));
        }
        Ok(listing)
    }
}

fn check_leaf_name(name: &str) -> Result<()> {
    if name.is_empty() {
        // Only the root splits into an empty leaf, and it always exists.
        return Err(FsError::Exists);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

fn commit_mkdir<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    parent_num: u32,
    parent: &mut Inode,
    inode_num: u32,
    inode: &mut Inode,
    name: &[u8],
) -> Result<()> {
    let dir_block = alloc_block(device, superblock, bitmap)?;
    inode.blocks[0] = dir_block;
    device.write_block(dir_block, &init_dir_block(inode_num, parent_num)?)?;
    write_inode(device, superblock, inode_num, inode)?;
    let entry = DirEntry::new(inode_num, name, FileType::Directory)?;
    dir_insert(device, superblock, bitmap, parent, &entry)?;
    write_inode(device, superblock, parent_num, parent)
}

fn commit_ingest<D: BlockDevice, R: Read>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    parent_num: u32,
    parent: &mut Inode,
    inode_num: u32,
    inode: &mut Inode,
    name: &[u8],
    source: &mut R,
    len: u64,
) -> Result<()> {
    write_inode(device, superblock, inode_num, inode)?;
    let entry = DirEntry::new(inode_num, name, FileType::Regular)?;
    dir_insert(device, superblock, bitmap, parent, &entry)?;
    write_inode(device, superblock, parent_num, parent)?;

    let mut remaining = len;
    let mut index = 0u32;
    let mut buf = [0u8; BLOCK_SIZE];
    while remaining > 0 {
        let take = remaining.min(BLOCK_SIZE as u64) as usize;
        buf.fill(0);
        source.read_exact(&mut buf[..take])?;
        let block_id = grow_one(device, superblock, bitmap, inode, index)?;
        device.write_block(block_id, &buf)?;
        remaining -= take as u64;
        index += 1;
    }
    inode.size = len as u32;
    write_inode(device, superblock, inode_num, inode)
}

/// Best-effort unwind of a half-created inode. The error that got us here
/// wins; secondary failures are dropped.
fn discard_inode<D: BlockDevice>(
    device: &D,
    superblock: &mut Superblock,
    bitmap: &mut Bitmap,
    inode_num: u32,
    inode: &mut Inode,
) {
    let _ = release_blocks(device, superblock, bitmap, inode);
    let _ = write_inode(device, superblock, inode_num, &Inode::ZERO);
    superblock.free_inodes_count += 1;
    let _ = write_superblock(device, superblock);
}

/// Byte `i` of an appended run is `'A' + (i % 26)`; `start` is the offset of
/// `buf` within the run.
fn fill_pattern(buf: &mut [u8], start: u64) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = b'A' + ((start + i as u64) % 26) as u8;
    }
}
