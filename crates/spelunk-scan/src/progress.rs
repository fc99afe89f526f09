//! Scan progress reporting.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use spelunk_core::Entry;
use tokio::sync::broadcast;

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of entries classified so far.
    pub entries_scanned: u64,
    /// Number of directories among them.
    pub dirs_scanned: u64,
    /// Disk usage of everything counted so far.
    pub bytes_scanned: u64,
    /// Entries flagged as errors.
    pub errors_count: u64,
    /// Path of the latest entry.
    pub current_path: PathBuf,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            entries_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            errors_count: 0,
            current_path: PathBuf::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in entries per second.
    pub fn entries_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.entries_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts entries during a walk and publishes snapshots periodically.
#[derive(Debug)]
pub(crate) struct ProgressTracker<'a> {
    tx: &'a broadcast::Sender<ScanProgress>,
    interval: u64,
    start_time: Instant,
    entries_scanned: u64,
    dirs_scanned: u64,
    bytes_scanned: u64,
    errors_count: u64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(tx: &'a broadcast::Sender<ScanProgress>, interval: u64) -> Self {
        Self {
            tx,
            interval,
            start_time: Instant::now(),
            entries_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            errors_count: 0,
        }
    }

    pub fn record_entry(&mut self, entry: &Entry, path: &Path) {
        self.entries_scanned += 1;
        if entry.is_dir() {
            self.dirs_scanned += 1;
        }
        self.bytes_scanned += entry.size_on_disk;
        if self.interval > 0 && self.entries_scanned % self.interval == 0 {
            self.publish(path);
        }
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }

    pub fn entries_scanned(&self) -> u64 {
        self.entries_scanned
    }

    pub fn errors_count(&self) -> u64 {
        self.errors_count
    }

    pub fn snapshot(&self, path: &Path) -> ScanProgress {
        ScanProgress {
            entries_scanned: self.entries_scanned,
            dirs_scanned: self.dirs_scanned,
            bytes_scanned: self.bytes_scanned,
            errors_count: self.errors_count,
            current_path: path.to_path_buf(),
            elapsed: self.start_time.elapsed(),
        }
    }

    /// Send a snapshot. Having no subscribers is not an error.
    pub fn publish(&self, path: &Path) {
        let _ = self.tx.send(self.snapshot(path));
    }
}
