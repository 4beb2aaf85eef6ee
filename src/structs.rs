use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config::*;
use crate::error::{FsError, Result};

/// The 36-byte header in block 0 describing image geometry and free-space
/// counts. Stored as nine little-endian `u32`s; the rest of the block is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub magic: u32,
    pub block_size: u32,
    pub blocks_count: u32,
    pub free_blocks_count: u32,
    pub inodes_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub first_inode_block: u32,
    pub bitmap_block: u32,
}

impl Superblock {
    /// Computes the geometry for a fresh image of `blocks_count` blocks:
    /// one inode per four blocks, the table packed right after the bitmap.
    /// The root inode is already accounted as in use.
    pub fn new(blocks_count: u32) -> Result<Self> {
        if blocks_count as usize > MAX_BLOCKS {
            return Err(FsError::TooLarge);
        }
        let inodes_count = blocks_count / 4;
        let inode_table_blocks =
            (inodes_count * INODE_SIZE as u32).div_ceil(BLOCK_SIZE as u32);
        let first_data_block = FIRST_INODE_BLOCK + inode_table_blocks;
        if inodes_count == 0 || first_data_block >= blocks_count {
            return Err(FsError::OutOfBlocks);
        }
        Ok(Superblock {
            magic: MAGIC,
            block_size: BLOCK_SIZE as u32,
            blocks_count,
            free_blocks_count: blocks_count - first_data_block,
            inodes_count,
            free_inodes_count: inodes_count - 1,
            first_data_block,
            first_inode_block: FIRST_INODE_BLOCK,
            bitmap_block: BITMAP_BLOCK,
        })
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(buf);
        Ok(Superblock {
            magic: cur.read_u32::<LittleEndian>()?,
            block_size: cur.read_u32::<LittleEndian>()?,
            blocks_count: cur.read_u32::<LittleEndian>()?,
            free_blocks_count: cur.read_u32::<LittleEndian>()?,
            inodes_count: cur.read_u32::<LittleEndian>()?,
            free_inodes_count: cur.read_u32::<LittleEndian>()?,
            first_data_block: cur.read_u32::<LittleEndian>()?,
            first_inode_block: cur.read_u32::<LittleEndian>()?,
            bitmap_block: cur.read_u32::<LittleEndian>()?,
        })
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        let mut cur = Cursor::new(buf);
        cur.write_u32::<LittleEndian>(self.magic)?;
        cur.write_u32::<LittleEndian>(self.block_size)?;
        cur.write_u32::<LittleEndian>(self.blocks_count)?;
        cur.write_u32::<LittleEndian>(self.free_blocks_count)?;
        cur.write_u32::<LittleEndian>(self.inodes_count)?;
        cur.write_u32::<LittleEndian>(self.free_inodes_count)?;
        cur.write_u32::<LittleEndian>(self.first_data_block)?;
        cur.write_u32::<LittleEndian>(self.first_inode_block)?;
        cur.write_u32::<LittleEndian>(self.bitmap_block)?;
        Ok(())
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    None = 0,
    Regular = 1,
    Directory = 2,
    Symlink = 3, // Reserved tag; no operation creates one
}

impl FileType {
    pub fn from_raw(raw: u32) -> FileType {
        match raw {
            1 => FileType::Regular,
            2 => FileType::Directory,
            3 => FileType::Symlink,
            _ => FileType::None,
        }
    }
}

/// A fixed 128-byte record describing one file or directory. Inodes are
/// 1-indexed; an inode with `links_count == 0` is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub mode: u32,
    pub size: u32,
    pub links_count: u32,
    /// Indices 0..12 are direct data-block pointers; index 12 names the
    /// single-indirect block. 0 means unallocated.
    pub blocks: [u32; INODE_PTRS],
}

impl Inode {
    pub const ZERO: Self = Inode {
        mode: 0,
        size: 0,
        links_count: 0,
        blocks: [0; INODE_PTRS],
    };

    pub fn new(ftype: FileType) -> Self {
        Inode {
            mode: ftype as u32,
            ..Inode::ZERO
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_raw(self.mode)
    }

    pub fn is_directory(&self) -> bool {
        self.file_type() == FileType::Directory
    }

    pub fn is_regular(&self) -> bool {
        self.file_type() == FileType::Regular
    }

    /// Number of data blocks covered by `size`.
    pub fn block_count(&self) -> u32 {
        self.size.div_ceil(BLOCK_SIZE as u32)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(buf);
        let mode = cur.read_u32::<LittleEndian>()?;
        let size = cur.read_u32::<LittleEndian>()?;
        let links_count = cur.read_u32::<LittleEndian>()?;
        let mut blocks = [0u32; INODE_PTRS];
        for slot in blocks.iter_mut() {
            *slot = cur.read_u32::<LittleEndian>()?;
        }
        Ok(Inode {
            mode,
            size,
            links_count,
            blocks,
        })
    }

    /// Encodes into the first `INODE_SIZE` bytes of `buf`; the bytes past the
    /// pointer array stay zero (reserved).
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        buf[..INODE_SIZE].fill(0);
        let mut cur = Cursor::new(buf);
        cur.write_u32::<LittleEndian>(self.mode)?;
        cur.write_u32::<LittleEndian>(self.size)?;
        cur.write_u32::<LittleEndian>(self.links_count)?;
        for slot in self.blocks.iter() {
            cur.write_u32::<LittleEndian>(*slot)?;
        }
        Ok(())
    }
}

/// A fixed 264-byte directory record binding a name to an inode.
///
/// `inode == 0` with `rec_len != 0` is a reusable tombstone; `inode == 0`
/// with `rec_len == 0` marks the unformatted tail of a block. Live entries
/// always carry `rec_len == DIR_ENTRY_SIZE`.
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
    pub name: [u8; 256],
}

impl DirEntry {
    pub fn new(inode: u32, name: &[u8], ftype: FileType) -> Result<Self> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(FsError::InvalidName);
        }
        let mut field = [0u8; 256];
        field[..name.len()].copy_from_slice(name);
        Ok(DirEntry {
            inode,
            rec_len: DIR_ENTRY_SIZE as u16,
            name_len: name.len() as u8,
            file_type: ftype as u8,
            name: field,
        })
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name[..self.name_len as usize]
    }

    pub fn is_live(&self) -> bool {
        self.inode != 0
    }

    /// True past the last record ever written to a block.
    pub fn is_end(&self) -> bool {
        self.inode == 0 && self.rec_len == 0
    }

    pub fn matches(&self, name: &[u8]) -> bool {
        self.name_len as usize == name.len() && self.name_bytes() == name
    }

    pub fn is_dot_or_dotdot(&self) -> bool {
        self.matches(DOT_NAME) || self.matches(DOTDOT_NAME)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(buf);
        let inode = cur.read_u32::<LittleEndian>()?;
        let rec_len = cur.read_u16::<LittleEndian>()?;
        let name_len = cur.read_u8()?;
        let file_type = cur.read_u8()?;
        let mut name = [0u8; 256];
        name.copy_from_slice(&buf[8..DIR_ENTRY_SIZE]);
        Ok(DirEntry {
            inode,
            rec_len,
            name_len,
            file_type,
            name,
        })
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        let mut cur = Cursor::new(&mut buf[..]);
        cur.write_u32::<LittleEndian>(self.inode)?;
        cur.write_u16::<LittleEndian>(self.rec_len)?;
        cur.write_u8(self.name_len)?;
        cur.write_u8(self.file_type)?;
        buf[8..DIR_ENTRY_SIZE].copy_from_slice(&self.name);
        Ok(())
    }
}
