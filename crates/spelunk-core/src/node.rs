//! File and directory node types.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryFlags, InodeInfo};
use crate::tree::SizeMode;

/// Unique identifier for a node within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new NodeId from a u64.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Type of file system node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Directory.
    Directory {
        /// Total number of files in this subtree.
        file_count: u64,
        /// Total number of directories in this subtree.
        dir_count: u64,
    },
    /// Symlinks, sockets, devices, and entries that could not be stat'ed.
    Other,
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory { .. })
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }
}

/// A single file or directory in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    /// Unique identifier for this node.
    pub id: NodeId,

    /// File/directory name (not full path).
    pub name: CompactString,

    /// Node type and associated counts.
    pub kind: NodeKind,

    /// Flags the scanner reported for this entry.
    pub flags: EntryFlags,

    /// Disk usage in bytes (aggregate for directories).
    pub disk_size: u64,

    /// Apparent size in bytes (aggregate for directories).
    pub apparent_size: u64,

    /// Inode info for hardlink detection.
    pub inode: Option<InodeInfo>,

    /// Children nodes (directories only).
    pub children: Vec<FileNode>,
}

impl FileNode {
    /// Create a node from a scanned entry, with the entry's own sizes.
    pub fn from_entry(id: NodeId, entry: Entry) -> Self {
        let kind = if entry.is_dir() {
            NodeKind::Directory {
                file_count: 0,
                dir_count: 0,
            }
        } else if entry.is_file() {
            NodeKind::File
        } else {
            NodeKind::Other
        };
        let inode = (entry.inode != 0 || entry.device != 0)
            .then(|| InodeInfo::new(entry.inode, entry.device));

        Self {
            id,
            name: entry.name,
            kind,
            flags: entry.flags,
            disk_size: entry.size_on_disk,
            apparent_size: entry.size_apparent,
            inode,
            children: Vec::new(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Size under the given accounting mode.
    pub fn size(&self, mode: SizeMode) -> u64 {
        match mode {
            SizeMode::Disk => self.disk_size,
            SizeMode::Apparent => self.apparent_size,
        }
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Get file count for directories, 1 for files.
    pub fn file_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { file_count, .. } => *file_count,
            NodeKind::File => 1,
            NodeKind::Other => 0,
        }
    }

    /// Get directory count for directories.
    pub fn dir_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { dir_count, .. } => *dir_count,
            _ => 0,
        }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children.iter().find(|c| c.name.as_str() == name)
    }

    /// Add a child whose size contribution has already been decided.
    ///
    /// Hardlinked files seen earlier in the tree contribute nothing, so the
    /// contribution is passed separately from the child's own sizes.
    pub(crate) fn attach(&mut self, child: FileNode, disk: u64, apparent: u64) {
        self.disk_size += disk;
        self.apparent_size += apparent;
        if let NodeKind::Directory {
            ref mut file_count,
            ref mut dir_count,
        } = self.kind
        {
            match &child.kind {
                NodeKind::File => *file_count += 1,
                NodeKind::Directory {
                    file_count: fc,
                    dir_count: dc,
                } => {
                    *file_count += fc;
                    *dir_count += dc + 1;
                }
                NodeKind::Other => {}
            }
        }
        self.children.push(child);
    }

    /// Sort children by size in descending order.
    pub fn sort_children_by_size(&mut self, mode: SizeMode) {
        self.children
            .sort_by(|a, b| b.size(mode).cmp(&a.size(mode)));
        for child in &mut self.children {
            child.sort_children_by_size(mode);
        }
    }
}
