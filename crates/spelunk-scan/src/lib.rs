//! Depth-first file system scanning engine for spelunk.
//!
//! The scanner walks a directory tree one level at a time, moving a single
//! position down into each directory and back up again, and reports what it
//! finds as a balanced stream of [`ScanEvent`]s.
//!
//! # Overview
//!
//! - **Bounded descriptors**: each directory is listed completely and its
//!   handle closed before the walker descends, so depth does not cost file
//!   descriptors.
//! - **Recoverable errors** are flagged on the entry and the walk goes on;
//!   losing the position (failing to return to a parent) aborts the scan.
//! - **Policies**: exclusion patterns and staying on the root filesystem
//!   both keep sizes out of the totals and prevent descent.
//!
//! # Example
//!
//! ```rust,no_run
//! use spelunk_scan::{ScanConfig, Scanner};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let scan = Scanner::new().scan_tree(&config).unwrap();
//!
//! println!("Total size: {} bytes", scan.tree.total_size());
//! println!("Total files: {}", scan.tree.total_files());
//! ```
//!
//! # Consuming events directly
//!
//! ```rust,no_run
//! use spelunk_scan::{CwdFs, EventLog, LastError, ScanConfig, Scanner};
//!
//! let mut log = EventLog::new();
//! let outcome = Scanner::new()
//!     .scan(
//!         &mut CwdFs::new(),
//!         &ScanConfig::new("/path/to/scan"),
//!         &mut log,
//!         &mut LastError::new(),
//!     )
//!     .unwrap();
//!
//! assert!(!outcome.is_fatal());
//! assert!(log.is_balanced());
//! ```

mod classify;
mod driver;
mod exclude;
mod fs;
mod lister;
mod mem;
mod path;
mod phase;
mod progress;
mod sink;
mod walker;

pub use classify::{DEFAULT_BLOCK_UNIT, ScanContext, classify};
pub use driver::{ScanOutcome, Scanner, TreeScan};
pub use exclude::{Exclude, GlobExclude, NoExclude};
pub use fs::{CwdFs, CwdListing, FileKind, ScanFs, Stat};
pub use lister::{Listing, list_current};
// In-memory fixture for tests; not part of the supported API.
#[doc(hidden)]
pub use mem::{MemFs, MemListing};
pub use path::PathStack;
pub use phase::ScanPhase;
pub use progress::ScanProgress;
pub use sink::{ErrorSink, LastError};
pub use walker::WalkStatus;

// Re-export core types for convenience
pub use spelunk_core::{
    Entry, EntryFlags, EventLog, FileNode, FileTree, NodeKind, ScanConfig, ScanConsumer,
    ScanError, ScanEvent, ScanWarning, SizeMode, TreeBuilder, TreeStats, WarningKind,
};
