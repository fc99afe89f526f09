//! Exclusion matching.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use spelunk_core::ScanError;

/// Decides whether a path is left out of the scan.
pub trait Exclude {
    /// Check the absolute path of an entry.
    fn matches(&self, path: &Path) -> bool;
}

impl<F: Fn(&Path) -> bool> Exclude for F {
    fn matches(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Excludes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExclude;

impl Exclude for NoExclude {
    fn matches(&self, _path: &Path) -> bool {
        false
    }
}

/// Glob patterns matched against the full path and against the entry name.
///
/// `*.log` therefore excludes log files anywhere, while `/var/cache/**`
/// excludes one subtree.
#[derive(Debug, Clone)]
pub struct GlobExclude {
    set: GlobSet,
}

impl GlobExclude {
    /// Compile a list of glob patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.kind().to_string(),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| ScanError::InvalidConfig {
            message: e.to_string(),
        })?;
        Ok(Self { set })
    }

    /// Check if no patterns were given.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl Exclude for GlobExclude {
    fn matches(&self, path: &Path) -> bool {
        if self.set.is_empty() {
            return false;
        }
        self.set.is_match(path) || path.file_name().is_some_and(|name| self.set.is_match(name))
    }
}
