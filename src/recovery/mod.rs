//! Directory-free recovery.
//!
//! A container is read back purely from its local headers, so the same
//! scan serves a cleanly closed file, one whose process crashed before
//! `close`, and one whose directory was damaged.  [`scan_file`] exposes the
//! walk without opening the container for writing.

mod scanner;

pub use scanner::{scan, scan_file, ScanReport, WipedRegion};
