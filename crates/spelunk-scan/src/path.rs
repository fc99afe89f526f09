//! Current path tracking during a walk.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// The absolute path of the entry being scanned.
///
/// `enter` and `leave` nest exactly with the walker's recursion.
#[derive(Debug, Default, Clone)]
pub struct PathStack {
    path: PathBuf,
}

impl PathStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole path.
    pub fn set(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// Append one segment.
    pub fn enter(&mut self, segment: &OsStr) {
        self.path.push(segment);
    }

    /// Drop the last segment.
    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// The current absolute path.
    pub fn current(&self) -> &Path {
        &self.path
    }
}
