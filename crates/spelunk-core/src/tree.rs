//! File tree container, statistics, and the event-driven tree builder.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

use crate::entry::{Entry, InodeInfo};
use crate::error::ScanWarning;
use crate::event::{ScanConsumer, ScanEvent};
use crate::node::{FileNode, NodeId};

/// Which size a tree is ordered and summarized by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeMode {
    /// Allocated blocks.
    #[default]
    Disk,
    /// Logical file length.
    Apparent,
}

/// Summary statistics for a scanned tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total disk usage in bytes, hardlinks counted once.
    pub total_disk_size: u64,
    /// Total apparent size in bytes, hardlinks counted once.
    pub total_apparent_size: u64,
    /// Total number of regular files.
    pub total_files: u64,
    /// Total number of directories below the root.
    pub total_dirs: u64,
    /// Entries that are neither files nor directories.
    pub total_other: u64,
    /// Entries flagged with an error.
    pub errors: u64,
    /// Entries matched by an exclude pattern.
    pub excluded: u64,
    /// Directories skipped for living on another filesystem.
    pub other_filesystem: u64,
    /// Hardlinked files not counted again.
    pub hardlink_duplicates: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
    /// Largest file (path, size).
    pub largest_file: Option<(PathBuf, u64)>,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with one entry found at `depth`.
    pub fn record_entry(&mut self, path: PathBuf, entry: &Entry, depth: u32, mode: SizeMode) {
        self.max_depth = self.max_depth.max(depth);
        let flags = &entry.flags;
        if flags.error {
            self.errors += 1;
        }
        if flags.excluded {
            self.excluded += 1;
        }
        if flags.other_filesystem {
            self.other_filesystem += 1;
        }

        if entry.is_dir() {
            if depth > 0 {
                self.total_dirs += 1;
            }
        } else if entry.is_file() {
            self.total_files += 1;
            let size = match mode {
                SizeMode::Disk => entry.size_on_disk,
                SizeMode::Apparent => entry.size_apparent,
            };
            if self.largest_file.as_ref().is_none_or(|(_, s)| size > *s) {
                self.largest_file = Some((path, size));
            }
        } else {
            self.total_other += 1;
        }
    }
}

/// Complete scanned file tree with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTree {
    /// Root node of the tree.
    pub root: FileNode,

    /// Root path that was scanned.
    pub root_path: PathBuf,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Size mode the children are ordered by.
    pub size_mode: SizeMode,

    /// Summary statistics.
    pub stats: TreeStats,

    /// Warnings encountered during scan.
    pub warnings: Vec<ScanWarning>,

    /// False when the scan was aborted and the tree is partial.
    pub complete: bool,
}

impl FileTree {
    /// Get the total size of the tree under its size mode.
    pub fn total_size(&self) -> u64 {
        self.root.size(self.size_mode)
    }

    /// Get the total number of files.
    pub fn total_files(&self) -> u64 {
        self.stats.total_files
    }

    /// Get the total number of directories.
    pub fn total_dirs(&self) -> u64 {
        self.stats.total_dirs
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Consumer that rebuilds a [`FileTree`] from scan events.
///
/// Directory sizes include the directory's own blocks plus everything below
/// it. A hardlinked inode contributes to the totals only the first time it
/// is seen.
#[derive(Debug)]
pub struct TreeBuilder {
    mode: SizeMode,
    stack: Vec<FileNode>,
    root: Option<FileNode>,
    next_id: u64,
    seen: HashSet<InodeInfo>,
    stats: TreeStats,
    warnings: Vec<ScanWarning>,
    fatal: Option<bool>,
    started: Instant,
    duration: Duration,
}

impl TreeBuilder {
    /// Create a builder ordering children by `mode`.
    pub fn new(mode: SizeMode) -> Self {
        Self {
            mode,
            stack: Vec::new(),
            root: None,
            next_id: 0,
            seen: HashSet::new(),
            stats: TreeStats::new(),
            warnings: Vec::new(),
            fatal: None,
            started: Instant::now(),
            duration: Duration::ZERO,
        }
    }

    /// Number of directories currently open.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn path_of(&self, name: &str) -> PathBuf {
        let mut path: PathBuf = self.stack.iter().map(|n| n.name.as_str()).collect();
        path.push(name);
        path
    }

    fn record(&mut self, entry: &Entry) {
        let path = self.path_of(&entry.name);
        let depth = self.stack.len() as u32;
        if entry.flags.error {
            let warning = if entry.is_dir() {
                ScanWarning::read_error(&path)
            } else {
                ScanWarning::metadata_error(&path)
            };
            self.warnings.push(warning);
        }
        self.stats.record_entry(path, entry, depth, self.mode);
    }

    /// Attach a finished node to the open directory, or make it the root.
    fn attach(&mut self, node: FileNode, disk: u64, apparent: u64) {
        match self.stack.last_mut() {
            Some(parent) => parent.attach(node, disk, apparent),
            None => self.root = Some(node),
        }
    }

    /// Finish building. Returns `None` if no root node was ever produced.
    ///
    /// Directories still open (a stream cut short) are closed implicitly.
    pub fn into_tree(mut self) -> Option<FileTree> {
        while let Some(node) = self.stack.pop() {
            let (disk, apparent) = (node.disk_size, node.apparent_size);
            self.attach(node, disk, apparent);
        }
        let mut root = self.root?;
        root.sort_children_by_size(self.mode);

        let mut stats = self.stats;
        stats.total_disk_size = root.disk_size;
        stats.total_apparent_size = root.apparent_size;

        Some(FileTree {
            root_path: PathBuf::from(root.name.as_str()),
            root,
            scanned_at: SystemTime::now(),
            scan_duration: self.duration,
            size_mode: self.mode,
            stats,
            warnings: self.warnings,
            complete: self.fatal == Some(false),
        })
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(SizeMode::Disk)
    }
}

impl ScanConsumer for TreeBuilder {
    fn on_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Open(entry) => {
                self.record(&entry);
                let id = self.next_id();
                self.stack.push(FileNode::from_entry(id, entry));
            }
            ScanEvent::Leaf(entry) => {
                self.record(&entry);
                let duplicate = entry
                    .hard_link_identity()
                    .is_some_and(|info| !self.seen.insert(info));
                let (disk, apparent) = if duplicate {
                    self.stats.hardlink_duplicates += 1;
                    (0, 0)
                } else {
                    (entry.size_on_disk, entry.size_apparent)
                };
                let id = self.next_id();
                self.attach(FileNode::from_entry(id, entry), disk, apparent);
            }
            ScanEvent::Close => {
                // A stray close with nothing open is ignored.
                if let Some(node) = self.stack.pop() {
                    let (disk, apparent) = (node.disk_size, node.apparent_size);
                    self.attach(node, disk, apparent);
                }
            }
        }
    }

    fn on_finalize(&mut self, fatal: bool) -> bool {
        self.fatal = Some(fatal);
        self.duration = self.started.elapsed();
        !fatal
    }
}
