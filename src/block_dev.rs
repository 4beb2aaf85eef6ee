use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::config::{BLOCK_SIZE, MAX_BLOCKS};
use crate::error::{FsError, Result};

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> u32;

    /// Reads one whole block. Fails for block IDs past the end of the device.
    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Writes one whole block. Fails for block IDs past the end of the device;
    /// the device never grows.
    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Pushes buffered writes down so a subsequent open sees them.
    fn flush(&self) -> Result<()>;
}

/// A block device backed by a regular file on the host filesystem.
#[derive(Debug)]
pub struct ImageDisk {
    file: Mutex<File>,
    num_blocks: u32,
}

impl ImageDisk {
    /// Creates a fresh image file of `size_bytes` rounded up to whole blocks,
    /// filled with zeros. An existing file at `path` is truncated.
    pub fn create<P: AsRef<Path>>(path: P, size_bytes: u64) -> Result<Self> {
        let num_blocks = size_bytes.div_ceil(BLOCK_SIZE as u64);
        if num_blocks > MAX_BLOCKS as u64 {
            return Err(FsError::TooLarge);
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let zero = [0u8; BLOCK_SIZE];
        for _ in 0..num_blocks {
            file.write_all(&zero)?;
        }
        file.flush()?;
        Ok(ImageDisk {
            file: Mutex::new(file),
            num_blocks: num_blocks as u32,
        })
    }

    /// Opens an existing image file read/write. The block count is taken from
    /// the file length; trailing partial blocks are not addressable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let num_blocks = file.metadata()?.len() / BLOCK_SIZE as u64;
        if num_blocks > MAX_BLOCKS as u64 {
            return Err(FsError::TooLarge);
        }
        Ok(ImageDisk {
            file: Mutex::new(file),
            num_blocks: num_blocks as u32,
        })
    }

    fn check_range(&self, block_id: u32) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block {} past end of image", block_id),
            )));
        }
        Ok(())
    }
}

impl BlockDevice for ImageDisk {
    fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn read_block(&self, block_id: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.check_range(block_id)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.check_range(block_id)?;
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.file.lock().unwrap().flush()?;
        Ok(())
    }
}
