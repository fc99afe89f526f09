//! Turning stat results into entry flags and sizes.

use std::io;

use spelunk_core::{Entry, NameCheck, ScanConfig};

use crate::fs::{FileKind, Stat};

/// Block unit assumed when the platform does not report one.
pub const DEFAULT_BLOCK_UNIT: u64 = 512;

/// Immutable per-scan state shared by the walker and driver.
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// Device of the scan root, captured once at scan start.
    pub root_device: u64,
    /// Refuse to descend into directories on another device.
    pub same_filesystem: bool,
    /// Which names are rejected without touching the filesystem.
    pub name_check: NameCheck,
}

impl ScanContext {
    /// Build the context for a scan of `config` whose root is on `root_device`.
    pub fn new(root_device: u64, config: &ScanConfig) -> Self {
        Self {
            root_device,
            same_filesystem: config.same_filesystem,
            name_check: config.name_check.clone(),
        }
    }
}

/// Fill in identity, type and size fields of `entry` from a stat result.
///
/// A failed stat only sets the error flag. Sizes stay zero for entries
/// already marked excluded and for those on another filesystem.
pub fn classify(entry: &mut Entry, stat: &io::Result<Stat>, ctx: &ScanContext) {
    let stat = match stat {
        Ok(stat) => stat,
        Err(_) => {
            entry.flags.error = true;
            return;
        }
    };

    entry.inode = stat.inode;
    entry.device = stat.device;

    match stat.kind {
        FileKind::File => entry.flags.is_file = true,
        FileKind::Directory => entry.flags.is_dir = true,
        FileKind::Symlink | FileKind::Other => {}
    }

    if stat.kind != FileKind::Directory && stat.nlink > 1 {
        entry.flags.hard_link_candidate = true;
    }

    if ctx.same_filesystem && stat.device != ctx.root_device {
        entry.flags.other_filesystem = true;
    }

    if entry.flags.counts_size() {
        let unit = stat.block_unit.unwrap_or(DEFAULT_BLOCK_UNIT);
        entry.size_on_disk = stat.blocks.saturating_mul(unit);
        entry.size_apparent = stat.size;
    }
}
