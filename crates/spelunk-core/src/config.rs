//! Scan configuration types.

use std::ffi::OsStr;
use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Policy for entry names the platform cannot represent in a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameCheck {
    /// Accept every name the directory listing returns.
    Any,
    /// Reject names containing any of these characters.
    Reject(Vec<char>),
}

impl NameCheck {
    /// The check appropriate for the current platform.
    ///
    /// Unix kernels never return a `/` inside a name, so nothing is checked
    /// there. Windows paths treat both slashes as separators, and virtual
    /// filesystems can surface names containing them.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            NameCheck::Reject(vec!['/', '\\'])
        } else {
            NameCheck::Any
        }
    }

    /// Check whether a name is usable as a single path segment.
    pub fn accepts(&self, name: &OsStr) -> bool {
        match self {
            NameCheck::Any => true,
            NameCheck::Reject(chars) => {
                let name = name.to_string_lossy();
                !name.chars().any(|c| chars.contains(&c))
            }
        }
    }
}

impl Default for NameCheck {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Do not descend into directories on another device than the root.
    #[builder(default = "false")]
    #[serde(default)]
    pub same_filesystem: bool,

    /// Use apparent size instead of disk usage when aggregating.
    #[builder(default = "false")]
    #[serde(default)]
    pub apparent_size: bool,

    /// Glob patterns to exclude, matched against full paths and names.
    #[builder(default)]
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Which entry names are rejected as unrepresentable.
    #[builder(default)]
    #[serde(default)]
    pub name_check: NameCheck,

    /// Publish a progress snapshot every this many entries (0 = only at end).
    #[builder(default = "1000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    1000
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            same_filesystem: false,
            apparent_size: false,
            exclude_patterns: Vec::new(),
            name_check: NameCheck::default(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
