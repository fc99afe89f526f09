//! Depth-first walk turning directory listings into scan events.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;

use spelunk_core::{Entry, ScanConsumer, ScanError, ScanEvent};
use tracing::{debug, error, warn};

use crate::classify::{ScanContext, classify};
use crate::exclude::Exclude;
use crate::fs::ScanFs;
use crate::lister::list_current;
use crate::path::PathStack;
use crate::progress::ProgressTracker;
use crate::sink::ErrorSink;

/// Outcome of walking an entry or a subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum WalkStatus {
    /// Everything was read.
    #[default]
    Ok,
    /// Some entries were flagged as errors; the walk went on.
    Recovered,
    /// The walker lost its position and stopped.
    Fatal,
}

impl WalkStatus {
    /// Combine two statuses, keeping the worse one.
    pub fn merge(self, other: WalkStatus) -> WalkStatus {
        self.max(other)
    }

    /// Check if the walk was aborted.
    pub fn is_fatal(self) -> bool {
        self == WalkStatus::Fatal
    }
}

/// Walks the tree below the current position of `fs`.
///
/// Every `Open` it emits is matched by a `Close`, including on the fatal
/// path, so consumers always see a balanced stream.
pub(crate) struct Walker<'a, F: ScanFs> {
    fs: &'a mut F,
    ctx: &'a ScanContext,
    exclude: &'a dyn Exclude,
    errors: &'a mut dyn ErrorSink,
    consumer: &'a mut dyn ScanConsumer,
    path: PathStack,
    progress: ProgressTracker<'a>,
    fatal: Option<ScanError>,
}

impl<'a, F: ScanFs> Walker<'a, F> {
    pub fn new(
        fs: &'a mut F,
        ctx: &'a ScanContext,
        exclude: &'a dyn Exclude,
        errors: &'a mut dyn ErrorSink,
        consumer: &'a mut dyn ScanConsumer,
        progress: ProgressTracker<'a>,
        root: &Path,
    ) -> Self {
        let mut path = PathStack::new();
        path.set(root);
        Self {
            fs,
            ctx,
            exclude,
            errors,
            consumer,
            path,
            progress,
            fatal: None,
        }
    }

    pub fn emit(&mut self, event: ScanEvent) {
        self.consumer.on_event(event);
    }

    /// Emit a directory that will not be descended into.
    fn emit_empty_dir(&mut self, entry: Entry) {
        self.emit(ScanEvent::Open(entry));
        self.emit(ScanEvent::Close);
    }

    /// Flag the entry at the current path as failed.
    pub fn record_error(&mut self, entry: &mut Entry) {
        entry.flags.error = true;
        self.errors.record(self.path.current());
        self.progress.record_error();
    }

    pub fn progress(&self) -> &ProgressTracker<'a> {
        &self.progress
    }

    pub fn current_path(&self) -> &Path {
        self.path.current()
    }

    /// The error that made the walk fatal, if it was.
    pub fn into_fatal(self) -> Option<ScanError> {
        self.fatal
    }

    /// Walk the names of the directory `fs` is positioned in.
    ///
    /// Stops at the first fatal child; remaining names are not visited.
    pub fn walk(&mut self, names: Vec<OsString>) -> WalkStatus {
        let mut status = WalkStatus::Ok;
        for name in names {
            self.path.enter(&name);
            let item = self.scan_item(&name);
            self.path.leave();

            status = status.merge(item);
            if status.is_fatal() {
                break;
            }
        }
        status
    }

    /// Classify and emit one direct child of the current position.
    fn scan_item(&mut self, name: &OsStr) -> WalkStatus {
        let mut entry = Entry::new(name.to_string_lossy().as_ref());
        let mut status = WalkStatus::Ok;

        if !self.ctx.name_check.accepts(name) {
            warn!(path = %self.path.current().display(), "unrepresentable name");
            self.record_error(&mut entry);
            status = WalkStatus::Recovered;
        } else {
            // Excluded entries are still stat'ed so directories keep their
            // type; classify leaves their sizes at zero.
            entry.flags.excluded = self.exclude.matches(self.path.current());
            match self.fs.lstat(name) {
                Ok(stat) => classify(&mut entry, &Ok(stat), self.ctx),
                Err(err) if entry.flags.excluded => {
                    debug!(path = %self.path.current().display(), error = %err, "stat of excluded entry failed");
                }
                Err(err) => {
                    warn!(path = %self.path.current().display(), error = %err, "stat failed");
                    self.record_error(&mut entry);
                    status = WalkStatus::Recovered;
                    classify(&mut entry, &Err(err), self.ctx);
                }
            }
        }

        self.progress.record_entry(&entry, self.path.current());

        if entry.flags.is_recursible() {
            status.merge(self.descend(entry, name))
        } else if entry.is_dir() {
            self.emit_empty_dir(entry);
            status
        } else {
            self.emit(ScanEvent::Leaf(entry));
            status
        }
    }

    /// Move into `name`, emit its subtree, and move back.
    fn descend(&mut self, mut entry: Entry, name: &OsStr) -> WalkStatus {
        if let Err(err) = self.fs.enter(name) {
            debug!(path = %self.path.current().display(), error = %err, "cannot enter directory");
            self.record_error(&mut entry);
            self.emit_empty_dir(entry);
            return WalkStatus::Recovered;
        }

        let listing = match list_current(&mut *self.fs) {
            Ok(listing) => listing,
            Err(err) => {
                debug!(path = %self.path.current().display(), error = %err, "cannot list directory");
                self.record_error(&mut entry);
                self.emit_empty_dir(entry);
                return self.ascend(WalkStatus::Recovered);
            }
        };

        let mut status = WalkStatus::Ok;
        if let Some(err) = &listing.partial {
            warn!(
                path = %self.path.current().display(),
                error = %err,
                names = listing.len(),
                "directory listing ended early"
            );
            self.record_error(&mut entry);
            status = WalkStatus::Recovered;
        }

        self.emit(ScanEvent::Open(entry));
        let children = self.walk(listing.names);
        self.emit(ScanEvent::Close);

        if children.is_fatal() {
            // Position is already unknown below us; do not move.
            return WalkStatus::Fatal;
        }
        self.ascend(status.merge(children))
    }

    /// Return to the parent directory; failing to do so is fatal.
    fn ascend(&mut self, status: WalkStatus) -> WalkStatus {
        match self.fs.leave() {
            Ok(()) => status,
            Err(err) => {
                error!(path = %self.path.current().display(), error = %err, "cannot return to parent directory");
                self.fatal = Some(lost_position(self.path.current(), err));
                WalkStatus::Fatal
            }
        }
    }
}

fn lost_position(path: &Path, source: io::Error) -> ScanError {
    ScanError::PositionLost {
        path: path.to_path_buf(),
        source,
    }
}
