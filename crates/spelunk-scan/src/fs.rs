//! Position-based filesystem access used by the walker.

use std::ffi::{OsStr, OsString};
use std::fs::{self, Metadata, ReadDir};
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Object type as reported by a non-following stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (never followed).
    Symlink,
    /// Sockets, devices, fifos.
    Other,
}

/// The subset of `lstat` output the scanner uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Object type.
    pub kind: FileKind,
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
    /// Hard link count.
    pub nlink: u64,
    /// Allocated blocks, in units of `block_unit`.
    pub blocks: u64,
    /// Size of one block unit, if the platform reports one.
    pub block_unit: Option<u64>,
    /// Logical size in bytes.
    pub size: u64,
}

impl Stat {
    /// Build from std metadata obtained without following symlinks.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            kind: kind_of(metadata),
            inode: metadata.ino(),
            device: metadata.dev(),
            nlink: metadata.nlink(),
            // st_blocks is always in 512-byte units, whatever st_blksize says
            blocks: metadata.blocks(),
            block_unit: Some(512),
            size: metadata.len(),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            kind: kind_of(metadata),
            inode: 0,
            device: 0,
            nlink: 1,
            // Estimate blocks from file size (512-byte blocks, rounded up)
            blocks: metadata.len().div_ceil(512),
            block_unit: None,
            size: metadata.len(),
        }
    }
}

fn kind_of(metadata: &Metadata) -> FileKind {
    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Directory
    } else if file_type.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    }
}

/// Filesystem operations relative to a single current position.
///
/// The scanner moves this position down into a child and back up to the
/// parent; all name-based calls resolve against it. Listing handles are only
/// ever held between [`ScanFs::open_listing`] and [`ScanFs::close_listing`].
pub trait ScanFs {
    /// Iterator over raw directory entry names, which may include `.` and `..`.
    type Listing: Iterator<Item = io::Result<OsString>>;

    /// Resolve a path to a canonical absolute path.
    fn canonicalize(&mut self, path: &Path) -> io::Result<PathBuf>;

    /// Move the position to an absolute path.
    fn set_position(&mut self, path: &Path) -> io::Result<()>;

    /// Move the position into the child directory `name`.
    fn enter(&mut self, name: &OsStr) -> io::Result<()>;

    /// Move the position back to the parent directory.
    fn leave(&mut self) -> io::Result<()>;

    /// Open the current directory for listing.
    fn open_listing(&mut self) -> io::Result<Self::Listing>;

    /// Release a listing handle.
    fn close_listing(&mut self, listing: Self::Listing) -> io::Result<()> {
        drop(listing);
        Ok(())
    }

    /// Stat `name` in the current directory without following symlinks.
    fn lstat(&mut self, name: &OsStr) -> io::Result<Stat>;

    /// Stat the current directory itself.
    fn lstat_current(&mut self) -> io::Result<Stat>;

    /// Called once when a scan is over, successful or not.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// [`ScanFs`] backed by the process working directory.
///
/// Descending N levels deep holds no open directory handles; the working
/// directory is the only positional resource. The working directory in
/// effect at construction is restored by [`ScanFs::finish`]. The working
/// directory is process-wide, so only one scan may use it at a time.
#[derive(Debug)]
pub struct CwdFs {
    origin: Option<PathBuf>,
}

impl CwdFs {
    /// Create a backend remembering the current working directory.
    pub fn new() -> Self {
        Self {
            origin: std::env::current_dir().ok(),
        }
    }

    /// Working directory that will be restored when the scan finishes.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

impl Default for CwdFs {
    fn default() -> Self {
        Self::new()
    }
}

/// Names from a `read_dir(".")` handle.
#[derive(Debug)]
pub struct CwdListing(ReadDir);

impl Iterator for CwdListing {
    type Item = io::Result<OsString>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|entry| entry.map(|e| e.file_name()))
    }
}

impl ScanFs for CwdFs {
    type Listing = CwdListing;

    fn canonicalize(&mut self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn set_position(&mut self, path: &Path) -> io::Result<()> {
        std::env::set_current_dir(path)
    }

    fn enter(&mut self, name: &OsStr) -> io::Result<()> {
        std::env::set_current_dir(name)
    }

    fn leave(&mut self) -> io::Result<()> {
        std::env::set_current_dir("..")
    }

    fn open_listing(&mut self) -> io::Result<CwdListing> {
        fs::read_dir(".").map(CwdListing)
    }

    fn lstat(&mut self, name: &OsStr) -> io::Result<Stat> {
        fs::symlink_metadata(name).map(|m| Stat::from_metadata(&m))
    }

    fn lstat_current(&mut self) -> io::Result<Stat> {
        fs::symlink_metadata(".").map(|m| Stat::from_metadata(&m))
    }

    fn finish(&mut self) -> io::Result<()> {
        match &self.origin {
            Some(origin) => std::env::set_current_dir(origin),
            None => Ok(()),
        }
    }
}
