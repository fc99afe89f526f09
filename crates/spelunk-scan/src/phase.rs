//! Process-wide scan phase marker.

use std::sync::atomic::{AtomicU8, Ordering};

static PHASE: AtomicU8 = AtomicU8::new(ScanPhase::Idle as u8);

/// What the host program is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanPhase {
    /// No scan has started.
    Idle = 0,
    /// A scan is running or has produced the current results.
    Scanning = 1,
}

impl ScanPhase {
    /// Read the current phase.
    pub fn current() -> Self {
        match PHASE.load(Ordering::Acquire) {
            1 => ScanPhase::Scanning,
            _ => ScanPhase::Idle,
        }
    }

    /// Publish a new phase.
    pub fn set(phase: ScanPhase) {
        PHASE.store(phase as u8, Ordering::Release);
    }
}
