//! Tests against real image files: formatting, remounting, and host file
//! round trips through `ingest`/`extract`.
#![allow(unused)]

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use msfs::*;
use tempfile::TempDir;

fn image_path(dir: &TempDir) -> PathBuf {
    dir.path().join("disk.img")
}

fn format_image(path: &Path, size_bytes: u64) {
    let disk = ImageDisk::create(path, size_bytes).unwrap();
    FileSystem::format(Arc::new(disk)).unwrap();
}

fn mount_image(path: &Path) -> FileSystem<ImageDisk> {
    FileSystem::mount(Arc::new(ImageDisk::open(path).unwrap())).unwrap()
}

#[test]
fn format_then_mount() {
    let dir = TempDir::new().unwrap();
    let path = image_path(&dir);
    format_image(&path, 1024 * 1024);
    assert_eq!(fs::metadata(&path).unwrap().len(), 1024 * 1024);

    let fs = mount_image(&path);
    assert_eq!(fs.usage(), (5, 256));
    assert!(fs.list("/").unwrap().is_empty());
}

#[test]
fn mount_rejects_foreign_files() {
    let dir = TempDir::new().unwrap();
    let path = image_path(&dir);
    let mut file = File::create(&path).unwrap();
    file.write_all(&[0x5au8; 2 * BLOCK_SIZE]).unwrap();
    drop(file);

    let disk = ImageDisk::open(&path).unwrap();
    assert!(matches!(
        FileSystem::mount(Arc::new(disk)),
        Err(Error::BadMagic)
    ));
}

#[test]
fn tree_survives_remount() {
    let dir = TempDir::new().unwrap();
    let path = image_path(&dir);
    format_image(&path, 1024 * 1024);

    let payload = b"Hello, world!";
    {
        let mut fs = mount_image(&path);
        fs.mkdir("/docs").unwrap();
        let mut reader = Cursor::new(payload.as_slice());
        fs.ingest("/docs/hello.txt", &mut reader, payload.len() as u64)
            .unwrap();
        fs.link("/docs/hello.txt", "/hello_too").unwrap();
    }

    let fs = mount_image(&path);
    assert_eq!(
        fs.list("/docs").unwrap(),
        vec![("hello.txt".to_string(), 13)]
    );
    assert_eq!(fs.stat("/hello_too").unwrap().links_count, 2);

    let mut out = Vec::new();
    fs.extract("/docs/hello.txt", &mut out).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn free_counts_survive_remount() {
    let dir = TempDir::new().unwrap();
    let path = image_path(&dir);
    format_image(&path, 1024 * 1024);

    let (used, free_inodes) = {
        let mut fs = mount_image(&path);
        fs.mkdir("/a").unwrap();
        fs.append("/a", 0).unwrap_err(); // directories never take appends
        let mut reader = Cursor::new(&b"abc"[..]);
        fs.ingest("/f", &mut reader, 3).unwrap();
        (fs.usage().0, fs.superblock().free_inodes_count)
    };

    let fs = mount_image(&path);
    assert_eq!(fs.usage().0, used);
    assert_eq!(fs.superblock().free_inodes_count, free_inodes);
}

#[test]
fn host_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = image_path(&dir);
    format_image(&path, 1024 * 1024);

    let hello = dir.path().join("hello.txt");
    fs::write(&hello, b"Hello, world!").unwrap();

    let mut vfs = mount_image(&path);
    let file = File::open(&hello).unwrap();
    let len = file.metadata().unwrap().len();
    let mut reader = BufReader::new(file);
    vfs.ingest("/h", &mut reader, len).unwrap();
    assert_eq!(vfs.list("/").unwrap(), vec![("h".to_string(), 13)]);

    let out_path = dir.path().join("out.txt");
    let mut writer = BufWriter::new(File::create(&out_path).unwrap());
    vfs.extract("/h", &mut writer).unwrap();
    writer.flush().unwrap();
    assert_eq!(fs::read(&out_path).unwrap(), fs::read(&hello).unwrap());
}

#[test]
fn large_file_round_trip_on_disk() {
    // 8 MiB image, comfortably holding the largest representable file.
    let dir = TempDir::new().unwrap();
    let path = image_path(&dir);
    format_image(&path, 8 * 1024 * 1024);

    let data: Vec<u8> = (0..MAX_FILE_SIZE).map(|i| (i * 31 % 253) as u8).collect();
    {
        let mut fs = mount_image(&path);
        let mut reader = Cursor::new(data.as_slice());
        fs.ingest("/big", &mut reader, data.len() as u64).unwrap();
    }

    let fs = mount_image(&path);
    let mut out = Vec::with_capacity(MAX_FILE_SIZE);
    fs.extract("/big", &mut out).unwrap();
    assert_eq!(out, data);
}
