//! The interactive shell: a thin front-end over the filesystem core.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use msfs::{FileSystem, ImageDisk, BLOCK_SIZE};

#[derive(Parser)]
#[command(name = "msfs", about = "A virtual filesystem kept inside a single image file")]
struct Args {
    /// Path to the image file; offered for creation when absent.
    image: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.image.exists() {
        create_image(&args.image)?;
    }

    let disk = ImageDisk::open(&args.image)
        .with_context(|| format!("failed to open image {}", args.image.display()))?;
    let mut fs = FileSystem::mount(Arc::new(disk)).context("failed to mount virtual disk")?;

    println!("Virtual disk mounted successfully");
    println!("Type 'help' for available commands or 'exit' to quit");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        if !execute(&line, &mut fs) {
            break;
        }
    }

    println!("Unmounting disk and exiting...");
    Ok(())
}

fn create_image(path: &Path) -> anyhow::Result<()> {
    print!("Virtual disk file does not exist. Create a new one? (y/n): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    if !matches!(answer.trim(), "y" | "Y") {
        bail!("no image to work with");
    }

    print!("Enter disk size in bytes: ");
    io::stdout().flush()?;
    let mut size = String::new();
    io::stdin().read_line(&mut size)?;
    let size: u64 = size.trim().parse().context("invalid disk size")?;

    let disk = ImageDisk::create(path, size).context("failed to create virtual disk")?;
    FileSystem::format(Arc::new(disk)).context("failed to format virtual disk")?;
    println!("Virtual disk created successfully");
    Ok(())
}

/// Dispatches one command line. Returns `false` when the session should end.
fn execute(input: &str, fs: &mut FileSystem<ImageDisk>) -> bool {
    let mut words = input.split_whitespace();
    let cmd = match words.next() {
        Some(cmd) => cmd,
        None => return true,
    };
    let args: Vec<&str> = words.collect();

    match (cmd, args.as_slice()) {
        ("exit", _) => return false,
        ("help", _) => print_help(),
        ("clear", _) => print!("\x1b[2J\x1b[1;1H"),
        ("mkdir", [path]) => match fs.mkdir(path) {
            Ok(()) => println!("Directory created successfully"),
            Err(e) => println!("Error: failed to create directory ({})", e),
        },
        ("rmdir", [path]) => match fs.rmdir(path) {
            Ok(()) => println!("Directory removed successfully"),
            Err(e) => println!("Error: failed to remove directory ({})", e),
        },
        ("copyto", [virt, sys]) => match copy_to_system(fs, virt, sys) {
            Ok(()) => println!("File copied successfully"),
            Err(e) => println!("Error: failed to copy file ({})", e),
        },
        ("copyfrom", [sys, virt]) => {
            if !Path::new(sys).exists() {
                println!("Error: system file does not exist");
            } else {
                match copy_from_system(fs, sys, virt) {
                    Ok(()) => println!("File copied successfully"),
                    Err(e) => println!("Error: failed to copy file ({})", e),
                }
            }
        }
        ("ls", rest) => {
            let path = rest.first().copied().unwrap_or("/");
            match fs.list(path) {
                Ok(entries) if entries.is_empty() => println!("Directory is empty"),
                Ok(entries) => print_listing(path, &entries),
                Err(e) => println!("Error: failed to list directory ({})", e),
            }
        }
        ("link", [target, link_path]) => match fs.link(target, link_path) {
            Ok(()) => println!("Link created successfully"),
            Err(e) => println!("Error: failed to create link ({})", e),
        },
        ("rm", [path]) => match fs.unlink(path) {
            Ok(()) => println!("File removed successfully"),
            Err(e) => println!("Error: failed to remove file ({})", e),
        },
        ("append", [path, bytes]) => match bytes.parse::<u64>() {
            Ok(bytes) if bytes > 0 => match fs.append(path, bytes) {
                Ok(()) => println!("{} bytes appended successfully", bytes),
                Err(e) => println!("Error: failed to append to file ({})", e),
            },
            _ => println!("Error: missing or invalid parameters"),
        },
        ("truncate", [path, bytes]) => match bytes.parse::<u64>() {
            Ok(bytes) if bytes > 0 => match fs.truncate(path, bytes) {
                Ok(()) => println!("File truncated by {} bytes successfully", bytes),
                Err(e) => println!("Error: failed to truncate file ({})", e),
            },
            _ => println!("Error: missing or invalid parameters"),
        },
        ("usage", _) => print_usage_stats(fs),
        ("mkdir" | "rmdir" | "rm" | "copyto" | "copyfrom" | "link" | "append" | "truncate", _) => {
            println!("Error: missing parameters")
        }
        _ => {
            println!("Unknown command: {}", cmd);
            print_help();
        }
    }
    true
}

fn copy_from_system(fs: &mut FileSystem<ImageDisk>, sys: &str, virt: &str) -> msfs::Result<()> {
    let file = File::open(sys)?;
    let len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    fs.ingest(virt, &mut reader, len)
}

fn copy_to_system(fs: &FileSystem<ImageDisk>, virt: &str, sys: &str) -> msfs::Result<()> {
    let mut writer = BufWriter::new(File::create(sys)?);
    fs.extract(virt, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn print_listing(path: &str, entries: &[(String, u32)]) {
    println!("Contents of {}:", path);
    println!("{:<30}{:>10}", "Name", "Size (B)");
    println!("{}", "-".repeat(40));
    let mut total: u64 = 0;
    for (name, size) in entries {
        println!("{:<30}{:>10}", name, size);
        total += *size as u64;
    }
    println!("{}", "-".repeat(40));
    println!("Total size: {} bytes", total);
}

fn print_usage_stats(fs: &FileSystem<ImageDisk>) {
    let (used, total) = fs.usage();
    let free = total - used;
    println!("Disk usage:");
    println!("Used: {} blocks ({} bytes)", used, used as u64 * BLOCK_SIZE as u64);
    println!("Total: {} blocks ({} bytes)", total, total as u64 * BLOCK_SIZE as u64);
    println!("Free: {} blocks ({} bytes)", free, free as u64 * BLOCK_SIZE as u64);
    println!("Usage: {:.2}%", used as f64 / total as f64 * 100.0);
}

fn print_help() {
    println!("Available commands:");
    println!("  mkdir <path> - Create a directory");
    println!("  rmdir <path> - Remove a directory");
    println!("  copyto <virt_path> <sys_path> - Copy a file from virtual disk to system");
    println!("  copyfrom <sys_path> <virt_path> - Copy a file from system to virtual disk");
    println!("  ls [<path>] - List directory contents");
    println!("  link <target> <link_path> - Create a hard link");
    println!("  rm <path> - Remove a file or link");
    println!("  append <path> <bytes> - Add bytes to a file");
    println!("  truncate <path> <bytes> - Truncate a file by bytes");
    println!("  usage - Show disk usage");
    println!("  clear - Clear the screen");
    println!("  help - Show this help");
    println!("  exit - Exit the program");
}
