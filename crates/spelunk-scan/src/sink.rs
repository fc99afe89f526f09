//! Storage for the most recent per-entry error.

use std::path::{Path, PathBuf};

/// Receives the path of every entry that ends up flagged as an error.
pub trait ErrorSink {
    /// Remember an error at `path`.
    fn record(&mut self, path: &Path);

    /// Forget earlier errors; called when a scan starts.
    fn reset(&mut self) {}
}

/// Keeps the last error path for display, and how many errors there were.
#[derive(Debug, Default, Clone)]
pub struct LastError {
    last: Option<PathBuf>,
    count: u64,
}

impl LastError {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the most recent error.
    pub fn last(&self) -> Option<&Path> {
        self.last.as_deref()
    }

    /// Number of errors since the last reset.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl ErrorSink for LastError {
    fn record(&mut self, path: &Path) {
        self.last = Some(path.to_path_buf());
        self.count += 1;
    }

    fn reset(&mut self) {
        self.last = None;
        self.count = 0;
    }
}
