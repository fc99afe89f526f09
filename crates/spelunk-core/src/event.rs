//! The event protocol between the scanner and its consumers.

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// One step of a depth-first scan.
///
/// Directories are reported as an `Open` followed, after their children, by
/// a matching `Close`. Everything else is a single `Leaf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A directory node begins; subsequent events are its children.
    Open(Entry),
    /// A non-directory entry.
    Leaf(Entry),
    /// The most recently opened, still open directory ends.
    Close,
}

impl ScanEvent {
    /// The entry carried by this event, if any.
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            ScanEvent::Open(entry) | ScanEvent::Leaf(entry) => Some(entry),
            ScanEvent::Close => None,
        }
    }
}

/// Receives the event stream of a scan.
pub trait ScanConsumer {
    /// Handle one event. Must tolerate arbitrarily deep nesting.
    fn on_event(&mut self, event: ScanEvent);

    /// Called exactly once when a started scan ends.
    ///
    /// `fatal` is true when the scan was aborted. Returns whether the host
    /// program should keep running.
    fn on_finalize(&mut self, fatal: bool) -> bool;
}

impl<C: ScanConsumer + ?Sized> ScanConsumer for &mut C {
    fn on_event(&mut self, event: ScanEvent) {
        (**self).on_event(event);
    }

    fn on_finalize(&mut self, fatal: bool) -> bool {
        (**self).on_finalize(fatal)
    }
}

/// Consumer that records every event in order.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    /// Events received so far.
    pub events: Vec<ScanEvent>,
    /// Argument of the finalize call, once it happened.
    pub finalized: Option<bool>,
    /// Ask the host to stop when the scan was fatal.
    pub stop_on_fatal: bool,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `Open` events.
    pub fn opens(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Open(_)))
            .count()
    }

    /// Number of `Close` events.
    pub fn closes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Close))
            .count()
    }

    /// Check that opens and closes nest: a stack replay never underflows and
    /// ends empty.
    pub fn is_balanced(&self) -> bool {
        let mut depth: usize = 0;
        for event in &self.events {
            match event {
                ScanEvent::Open(_) => depth += 1,
                ScanEvent::Close => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return false,
                },
                ScanEvent::Leaf(_) => {}
            }
        }
        depth == 0
    }

    /// Find the first entry with the given name.
    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.events
            .iter()
            .filter_map(ScanEvent::entry)
            .find(|e| e.name.as_str() == name)
    }

    /// Names of all entries in event order.
    pub fn names(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(ScanEvent::entry)
            .map(|e| e.name.as_str())
            .collect()
    }
}

impl ScanConsumer for EventLog {
    fn on_event(&mut self, event: ScanEvent) {
        self.events.push(event);
    }

    fn on_finalize(&mut self, fatal: bool) -> bool {
        self.finalized = Some(fatal);
        !(fatal && self.stop_on_fatal)
    }
}
