//! In-memory [`ScanFs`] with fault injection.
//!
//! Useful for driving scans deterministically: device boundaries, link
//! counts, and failures at every filesystem call can be set per path.
//! Paths given to the builder methods are relative to the root and use `/`
//! separators; `""` names the root itself.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::fs::{FileKind, ScanFs, Stat};

const DIR_SIZE: u64 = 4096;

#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    stat: bool,
    enter: bool,
    open: bool,
    read_after: Option<usize>,
    close: bool,
    leave: bool,
}

#[derive(Debug)]
struct MemNode {
    name: OsString,
    parent: Option<usize>,
    children: Vec<usize>,
    stat: Stat,
    faults: Faults,
}

/// An in-memory directory tree implementing [`ScanFs`].
#[derive(Debug)]
pub struct MemFs {
    root_path: PathBuf,
    nodes: Vec<MemNode>,
    cwd: usize,
    next_inode: u64,
    open_listings: usize,
    max_open_listings: usize,
    leaves: usize,
}

/// Listing handle produced by [`MemFs`].
#[derive(Debug)]
pub struct MemListing {
    items: VecDeque<io::Result<OsString>>,
}

impl Iterator for MemListing {
    type Item = io::Result<OsString>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.pop_front()
    }
}

fn dir_stat(inode: u64) -> Stat {
    Stat {
        kind: FileKind::Directory,
        inode,
        device: 1,
        nlink: 2,
        blocks: DIR_SIZE / 512,
        block_unit: Some(512),
        size: DIR_SIZE,
    }
}

impl MemFs {
    /// Create a tree whose root directory lives at the absolute `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root_path = root.into();
        let root = MemNode {
            name: root_path.as_os_str().to_owned(),
            parent: None,
            children: Vec::new(),
            stat: dir_stat(1),
            faults: Faults::default(),
        };
        Self {
            root_path,
            nodes: vec![root],
            cwd: 0,
            next_inode: 2,
            open_listings: 0,
            max_open_listings: 0,
            leaves: 0,
        }
    }

    fn lookup(&self, rel: &str) -> Option<usize> {
        rel.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(0, |node, segment| self.child(node, OsStr::new(segment)))
    }

    fn child(&self, node: usize, name: &OsStr) -> Option<usize> {
        self.nodes[node]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name == name)
    }

    fn node_mut(&mut self, rel: &str) -> &mut MemNode {
        match self.lookup(rel) {
            Some(index) => &mut self.nodes[index],
            None => panic!("no such path in MemFs: {rel:?}"),
        }
    }

    /// Insert a node, creating missing parent directories.
    fn insert(&mut self, rel: &str, kind: FileKind, size: u64) -> &mut Self {
        let mut parent = 0;
        let mut segments = rel.split('/').filter(|s| !s.is_empty()).peekable();
        while let Some(segment) = segments.next() {
            let last = segments.peek().is_none();
            if let Some(existing) = self.child(parent, OsStr::new(segment)) {
                parent = existing;
                continue;
            }
            let inode = self.next_inode;
            self.next_inode += 1;
            let stat = if last && kind != FileKind::Directory {
                Stat {
                    kind,
                    inode,
                    device: self.nodes[parent].stat.device,
                    nlink: 1,
                    blocks: size.div_ceil(512),
                    block_unit: Some(512),
                    size,
                }
            } else {
                Stat {
                    device: self.nodes[parent].stat.device,
                    ..dir_stat(inode)
                }
            };
            self.nodes.push(MemNode {
                name: OsString::from(segment),
                parent: Some(parent),
                children: Vec::new(),
                stat,
                faults: Faults::default(),
            });
            let index = self.nodes.len() - 1;
            self.nodes[parent].children.push(index);
            parent = index;
        }
        self
    }

    /// Add a directory.
    pub fn dir(&mut self, rel: &str) -> &mut Self {
        self.insert(rel, FileKind::Directory, DIR_SIZE)
    }

    /// Add a regular file of `size` bytes.
    pub fn file(&mut self, rel: &str, size: u64) -> &mut Self {
        self.insert(rel, FileKind::File, size)
    }

    /// Add a symbolic link.
    pub fn symlink(&mut self, rel: &str) -> &mut Self {
        self.insert(rel, FileKind::Symlink, 12)
    }

    /// Add a socket, device or fifo.
    pub fn special(&mut self, rel: &str) -> &mut Self {
        self.insert(rel, FileKind::Other, 0)
    }

    /// Change the device of an existing path.
    ///
    /// # Panics
    ///
    /// Panics if `rel` does not exist, like every other modifier.
    pub fn set_device(&mut self, rel: &str, device: u64) -> &mut Self {
        self.node_mut(rel).stat.device = device;
        self
    }

    /// Change the hard link count of an existing path.
    pub fn set_links(&mut self, rel: &str, nlink: u64) -> &mut Self {
        self.node_mut(rel).stat.nlink = nlink;
        self
    }

    /// Change the inode of an existing path.
    pub fn set_inode(&mut self, rel: &str, inode: u64) -> &mut Self {
        self.node_mut(rel).stat.inode = inode;
        self
    }

    /// Change the allocated block count of an existing path.
    pub fn set_blocks(&mut self, rel: &str, blocks: u64, unit: Option<u64>) -> &mut Self {
        let node = self.node_mut(rel);
        node.stat.blocks = blocks;
        node.stat.block_unit = unit;
        self
    }

    /// Make stat of `rel` fail.
    pub fn fail_stat(&mut self, rel: &str) -> &mut Self {
        self.node_mut(rel).faults.stat = true;
        self
    }

    /// Make entering `rel` fail.
    pub fn fail_enter(&mut self, rel: &str) -> &mut Self {
        self.node_mut(rel).faults.enter = true;
        self
    }

    /// Make opening `rel` for listing fail.
    pub fn fail_open(&mut self, rel: &str) -> &mut Self {
        self.node_mut(rel).faults.open = true;
        self
    }

    /// Make listing `rel` fail after `count` names.
    pub fn fail_read_after(&mut self, rel: &str, count: usize) -> &mut Self {
        self.node_mut(rel).faults.read_after = Some(count);
        self
    }

    /// Make closing the listing of `rel` fail.
    pub fn fail_close(&mut self, rel: &str) -> &mut Self {
        self.node_mut(rel).faults.close = true;
        self
    }

    /// Make leaving `rel` for its parent fail.
    pub fn fail_leave(&mut self, rel: &str) -> &mut Self {
        self.node_mut(rel).faults.leave = true;
        self
    }

    /// Absolute path of the current position.
    pub fn position(&self) -> PathBuf {
        let mut names = Vec::new();
        let mut node = Some(self.cwd);
        while let Some(index) = node {
            names.push(self.nodes[index].name.as_os_str());
            node = self.nodes[index].parent;
        }
        names.iter().rev().collect()
    }

    /// Listing handles currently open.
    pub fn open_listings(&self) -> usize {
        self.open_listings
    }

    /// Highest number of listing handles open at the same time.
    pub fn max_open_listings(&self) -> usize {
        self.max_open_listings
    }

    /// Number of successful moves back to a parent.
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    fn resolve(&self, path: &Path) -> Option<usize> {
        let rel = if path.is_absolute() {
            path.strip_prefix(&self.root_path).ok()?
        } else {
            path
        };
        let mut node = 0;
        for component in rel.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => node = self.nodes[node].parent.unwrap_or(0),
                Component::Normal(name) => node = self.child(node, name)?,
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(node)
    }
}

fn not_found(what: impl AsRef<Path>) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", what.as_ref().display()),
    )
}

fn denied() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "permission denied")
}

impl ScanFs for MemFs {
    type Listing = MemListing;

    fn canonicalize(&mut self, path: &Path) -> io::Result<PathBuf> {
        let node = self.resolve(path).ok_or_else(|| not_found(path))?;
        let saved = std::mem::replace(&mut self.cwd, node);
        let canonical = self.position();
        self.cwd = saved;
        Ok(canonical)
    }

    fn set_position(&mut self, path: &Path) -> io::Result<()> {
        let node = self.resolve(path).ok_or_else(|| not_found(path))?;
        if self.nodes[node].stat.kind != FileKind::Directory {
            return Err(io::Error::new(io::ErrorKind::NotADirectory, "not a directory"));
        }
        self.cwd = node;
        Ok(())
    }

    fn enter(&mut self, name: &OsStr) -> io::Result<()> {
        let node = self.child(self.cwd, name).ok_or_else(|| not_found(name))?;
        let target = &self.nodes[node];
        if target.faults.enter {
            return Err(denied());
        }
        if target.stat.kind != FileKind::Directory {
            return Err(io::Error::new(io::ErrorKind::NotADirectory, "not a directory"));
        }
        self.cwd = node;
        Ok(())
    }

    fn leave(&mut self) -> io::Result<()> {
        let current = &self.nodes[self.cwd];
        if current.faults.leave {
            return Err(io::Error::other("stale file handle"));
        }
        let parent = current.parent.ok_or_else(|| not_found(".."))?;
        self.cwd = parent;
        self.leaves += 1;
        Ok(())
    }

    fn open_listing(&mut self) -> io::Result<MemListing> {
        let current = &self.nodes[self.cwd];
        if current.faults.open {
            return Err(denied());
        }

        let mut items: VecDeque<io::Result<OsString>> =
            VecDeque::from([Ok(OsString::from(".")), Ok(OsString::from(".."))]);
        let limit = current.faults.read_after.unwrap_or(usize::MAX);
        for &child in current.children.iter().take(limit) {
            items.push_back(Ok(self.nodes[child].name.clone()));
        }
        if current.faults.read_after.is_some() {
            items.push_back(Err(io::Error::other("input/output error")));
        }

        self.open_listings += 1;
        self.max_open_listings = self.max_open_listings.max(self.open_listings);
        Ok(MemListing { items })
    }

    fn close_listing(&mut self, listing: MemListing) -> io::Result<()> {
        drop(listing);
        self.open_listings = self.open_listings.saturating_sub(1);
        if self.nodes[self.cwd].faults.close {
            return Err(io::Error::other("close failed"));
        }
        Ok(())
    }

    fn lstat(&mut self, name: &OsStr) -> io::Result<Stat> {
        let node = self.child(self.cwd, name).ok_or_else(|| not_found(name))?;
        if self.nodes[node].faults.stat {
            return Err(denied());
        }
        Ok(self.nodes[node].stat)
    }

    fn lstat_current(&mut self) -> io::Result<Stat> {
        Ok(self.nodes[self.cwd].stat)
    }
}
