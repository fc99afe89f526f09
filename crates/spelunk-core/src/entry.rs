//! Scanned entries and their flags.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Inode information for hardlink detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// Independent facets describing a scanned entry.
///
/// At most one of `is_file` and `is_dir` is set. Neither is set when the
/// entry could not be stat'ed, in which case `error` is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFlags {
    /// Regular file.
    pub is_file: bool,
    /// Directory.
    pub is_dir: bool,
    /// Non-directory with more than one hard link.
    pub hard_link_candidate: bool,
    /// Lives on a different device than the scan root.
    pub other_filesystem: bool,
    /// Matched an exclusion pattern.
    pub excluded: bool,
    /// Stat, open or read of this entry failed.
    pub error: bool,
}

impl EntryFlags {
    /// Whether the walker may descend into this entry.
    pub fn is_recursible(&self) -> bool {
        self.is_dir && !(self.error || self.excluded || self.other_filesystem)
    }

    /// Whether this entry's sizes count towards totals.
    pub fn counts_size(&self) -> bool {
        !(self.excluded || self.other_filesystem)
    }
}

/// One scanned filesystem object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Name relative to the parent directory (the full path for the root).
    ///
    /// Converted lossily: bytes that are not valid UTF-8 become U+FFFD, so
    /// distinct raw names can map to the same string. Do not rebuild paths
    /// from it to reopen files.
    pub name: CompactString,

    /// Inode number, zero when unknown.
    pub inode: u64,

    /// Device ID, zero when unknown.
    pub device: u64,

    /// Allocated size in bytes (blocks scaled by the block unit).
    pub size_on_disk: u64,

    /// Logical size in bytes.
    pub size_apparent: u64,

    /// Type, policy and error facets.
    pub flags: EntryFlags,
}

impl Entry {
    /// Create an unclassified entry with zero sizes and no flags.
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            inode: 0,
            device: 0,
            size_on_disk: 0,
            size_apparent: 0,
            flags: EntryFlags::default(),
        }
    }

    /// Identity used for hardlink deduplication, if this entry may share it.
    ///
    /// Entries whose sizes do not count have none, so an excluded or
    /// foreign link never claims the inode ahead of a counted one.
    pub fn hard_link_identity(&self) -> Option<InodeInfo> {
        (self.flags.hard_link_candidate && self.flags.counts_size())
            .then(|| InodeInfo::new(self.inode, self.device))
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.flags.is_dir
    }

    /// Check if this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.flags.is_file
    }
}
