//! Path normalization and resolution. Paths are absolute, rooted at `/`;
//! resolution walks component by component over direct directory blocks and
//! never mutates the image.

use crate::block_dev::BlockDevice;
use crate::config::ROOT_INODE;
use crate::directory::dir_lookup;
use crate::error::{FsError, Result};
use crate::inode::read_inode;
use crate::structs::Superblock;

/// Prepends `/` if absent and strips one trailing `/` (the root keeps its).
pub fn normalize(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Splits a normalized path into its parent directory and leaf name.
/// The root splits into `("/", "")`.
pub fn split_path(path: &str) -> (String, String) {
    let normalized = normalize(path);
    match normalized.rfind('/') {
        Some(0) => ("/".to_string(), normalized[1..].to_string()),
        Some(pos) => (
            normalized[..pos].to_string(),
            normalized[pos + 1..].to_string(),
        ),
        None => unreachable!("normalized paths start with '/'"),
    }
}

/// Resolves a path to its inode number, starting at the root. Every
/// component but the last must name a directory; `.` and `..` resolve
/// through their literal entries, which every directory carries.
pub fn resolve<D: BlockDevice>(
    device: &D,
    superblock: &Superblock,
    path: &str,
) -> Result<u32> {
    let normalized = normalize(path);
    let mut current = ROOT_INODE;
    for component in normalized.split('/').filter(|c| !c.is_empty()) {
        let inode = read_inode(device, superblock, current)?;
        if !inode.is_directory() {
            return Err(FsError::NotADirectory);
        }
        current = dir_lookup(device, &inode, component.as_bytes())?
            .ok_or(FsError::NotFound)?;
    }
    Ok(current)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/a/b"), "/a/b");
        assert_eq!(normalize("/a/b/"), "/a/b");
        assert_eq!(normalize("a/b"), "/a/b");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(
            split_path("/home/user/file.txt"),
            ("/home/user".to_string(), "file.txt".to_string())
        );
        assert_eq!(
            split_path("/file.txt"),
            ("/".to_string(), "file.txt".to_string())
        );
        assert_eq!(split_path("/"), ("/".to_string(), "".to_string()));
        assert_eq!(split_path("/a/"), ("/".to_string(), "a".to_string()));
    }
}
