use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("path not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a regular file")]
    NotAFile,
    #[error("name already exists")]
    Exists,
    #[error("directory not empty")]
    NotEmpty,
    #[error("no free blocks")]
    OutOfBlocks,
    #[error("no free inodes")]
    OutOfInodes,
    #[error("exceeds maximum supported size")]
    TooLarge,
    #[error("invalid file name")]
    InvalidName,
    #[error("not a recognized filesystem image")]
    BadMagic,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, FsError>;
