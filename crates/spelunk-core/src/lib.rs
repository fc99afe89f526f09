//! Core types and traits for spelunk.
//!
//! This crate provides the data model shared by the scanner and its
//! consumers: scanned entries and their flags, the open/leaf/close event
//! protocol, scan configuration, errors, and a tree builder that turns an
//! event stream back into an aggregated file tree.

mod config;
mod entry;
mod error;
mod event;
mod node;
mod tree;

pub use config::{NameCheck, ScanConfig, ScanConfigBuilder};
pub use entry::{Entry, EntryFlags, InodeInfo};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use event::{EventLog, ScanConsumer, ScanEvent};
pub use node::{FileNode, NodeId, NodeKind};
pub use tree::{FileTree, SizeMode, TreeBuilder, TreeStats};
