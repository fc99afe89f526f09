//! Reading the names of the current directory.

use std::ffi::OsString;
use std::io;

use crate::fs::ScanFs;

/// Names of the children of one directory, in enumeration order.
#[derive(Debug, Default)]
pub struct Listing {
    /// Every name read before the listing ended or failed.
    pub names: Vec<OsString>,
    /// Set when reading or closing failed after the directory was opened.
    pub partial: Option<io::Error>,
}

impl Listing {
    /// Whether some names may be missing.
    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    /// Number of names collected.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no names were collected.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// List the directory `fs` is positioned in, excluding `.` and `..`.
///
/// The handle is drained and closed before returning, so callers may recurse
/// into the names without keeping it open. An error is returned only when
/// the directory could not be opened at all; failures after that are kept in
/// [`Listing::partial`] alongside the names read so far.
pub fn list_current<F: ScanFs>(fs: &mut F) -> io::Result<Listing> {
    let mut handle = fs.open_listing()?;
    let mut listing = Listing::default();

    for name in handle.by_ref() {
        match name {
            Ok(name) if name == "." || name == ".." => {}
            Ok(name) => listing.names.push(name),
            Err(err) => {
                listing.partial = Some(err);
                break;
            }
        }
    }

    if let Err(err) = fs.close_listing(handle) {
        if listing.partial.is_none() {
            listing.partial = Some(err);
        }
    }
    Ok(listing)
}
