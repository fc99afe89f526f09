//! Running one complete scan.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use spelunk_core::{
    Entry, FileTree, ScanConfig, ScanConsumer, ScanError, ScanEvent, SizeMode, TreeBuilder,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::classify::{ScanContext, classify};
use crate::exclude::{Exclude, GlobExclude};
use crate::fs::{CwdFs, FileKind, ScanFs};
use crate::lister::list_current;
use crate::phase::ScanPhase;
use crate::progress::{ProgressTracker, ScanProgress};
use crate::sink::{ErrorSink, LastError};
use crate::walker::{WalkStatus, Walker};

/// Result of a scan that was started.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Worst status seen while walking.
    pub status: WalkStatus,
    /// The consumer's verdict from its finalize hook.
    pub continue_host: bool,
    /// Why the scan was aborted, when it was.
    pub fatal_error: Option<ScanError>,
    /// Entries classified below the root.
    pub entries: u64,
    /// Entries flagged as errors, the root included.
    pub errors: u64,
    /// Wall time of the scan.
    pub duration: Duration,
}

impl ScanOutcome {
    /// Check if the scan was aborted.
    pub fn is_fatal(&self) -> bool {
        self.status.is_fatal()
    }
}

/// A scan of the real filesystem collected into a tree.
#[derive(Debug)]
pub struct TreeScan {
    /// The aggregated tree.
    pub tree: FileTree,
    /// How the scan went.
    pub outcome: ScanOutcome,
    /// Path of the last entry that failed.
    pub last_error: Option<PathBuf>,
}

/// Depth-first scanner emitting events to a [`ScanConsumer`].
pub struct Scanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl Scanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan `config.root` through `fs`, excluding `config.exclude_patterns`.
    pub fn scan<F: ScanFs>(
        &self,
        fs: &mut F,
        config: &ScanConfig,
        consumer: &mut dyn ScanConsumer,
        errors: &mut dyn ErrorSink,
    ) -> Result<ScanOutcome, ScanError> {
        let exclude = GlobExclude::new(&config.exclude_patterns)?;
        self.scan_with(fs, config, &exclude, consumer, errors)
    }

    /// Scan with a caller-provided exclusion matcher.
    ///
    /// Configuration errors are returned before any event is emitted and
    /// without calling the consumer's finalize hook. Once the root's `Open`
    /// has been emitted the scan always ends with its `Close` and exactly one
    /// finalize call.
    pub fn scan_with<F: ScanFs>(
        &self,
        fs: &mut F,
        config: &ScanConfig,
        exclude: &dyn Exclude,
        consumer: &mut dyn ScanConsumer,
        errors: &mut dyn ErrorSink,
    ) -> Result<ScanOutcome, ScanError> {
        ScanPhase::set(ScanPhase::Scanning);
        errors.reset();

        let result = self.run(fs, config, exclude, consumer, errors);

        if let Err(err) = fs.finish() {
            warn!(error = %err, "could not restore working directory");
        }
        result
    }

    fn run<F: ScanFs>(
        &self,
        fs: &mut F,
        config: &ScanConfig,
        exclude: &dyn Exclude,
        consumer: &mut dyn ScanConsumer,
        errors: &mut dyn ErrorSink,
    ) -> Result<ScanOutcome, ScanError> {
        let start = Instant::now();

        let root = fs
            .canonicalize(&config.root)
            .map_err(|e| ScanError::io(&config.root, e))?;
        fs.set_position(&root).map_err(|e| ScanError::io(&root, e))?;
        let root_stat = fs.lstat_current().map_err(|e| ScanError::io(&root, e))?;
        if root_stat.kind != FileKind::Directory {
            return Err(ScanError::NotADirectory { path: root });
        }

        info!(
            root = %root.display(),
            same_filesystem = config.same_filesystem,
            "starting scan"
        );

        let ctx = ScanContext::new(root_stat.device, config);
        let mut root_entry = Entry::new(root.to_string_lossy().as_ref());
        classify(&mut root_entry, &Ok(root_stat), &ctx);
        let listing = list_current(&mut *fs);

        let tracker = ProgressTracker::new(&self.progress_tx, config.progress_interval);
        let mut walker = Walker::new(fs, &ctx, exclude, &mut *errors, &mut *consumer, tracker, &root);

        let mut status = WalkStatus::Ok;
        let names = match listing {
            Ok(listing) => {
                if let Some(err) = &listing.partial {
                    warn!(root = %root.display(), error = %err, "root listing ended early");
                    walker.record_error(&mut root_entry);
                    status = WalkStatus::Recovered;
                }
                listing.names
            }
            Err(err) => {
                warn!(root = %root.display(), error = %err, "cannot list root");
                walker.record_error(&mut root_entry);
                status = WalkStatus::Recovered;
                Vec::new()
            }
        };

        walker.emit(ScanEvent::Open(root_entry));
        status = status.merge(walker.walk(names));
        walker.emit(ScanEvent::Close);

        walker.progress().publish(walker.current_path());
        let entries = walker.progress().entries_scanned();
        let error_count = walker.progress().errors_count();
        let fatal_error = walker.into_fatal();

        let continue_host = consumer.on_finalize(status.is_fatal());
        let duration = start.elapsed();

        info!(
            root = %root.display(),
            entries,
            errors = error_count,
            fatal = status.is_fatal(),
            elapsed_ms = duration.as_millis() as u64,
            "scan finished"
        );

        Ok(ScanOutcome {
            status,
            continue_host,
            fatal_error,
            entries,
            errors: error_count,
            duration,
        })
    }

    /// Scan the real filesystem and build a [`FileTree`].
    ///
    /// Uses the process working directory, which is restored afterwards.
    pub fn scan_tree(&self, config: &ScanConfig) -> Result<TreeScan, ScanError> {
        let mode = if config.apparent_size {
            SizeMode::Apparent
        } else {
            SizeMode::Disk
        };
        let mut fs = CwdFs::new();
        let mut builder = TreeBuilder::new(mode);
        let mut last_error = LastError::new();

        let outcome = self.scan(&mut fs, config, &mut builder, &mut last_error)?;
        let tree = builder.into_tree().ok_or_else(|| ScanError::Other {
            message: "scan produced no tree".to_string(),
        })?;

        Ok(TreeScan {
            tree,
            outcome,
            last_error: last_error.last().map(|p| p.to_path_buf()),
        })
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}
