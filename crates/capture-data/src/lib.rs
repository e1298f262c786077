//! Capture file ingestion.
//!
//! Decodes CSV, JSON, log, archive and manifest capture files into the
//! canonical model from [`capture_core`], and scans directories of them.

pub mod context;
pub mod formats;
pub mod parser;
pub mod scan;

pub use capture_core as core;
pub use context::ParseContext;
pub use parser::CaptureParser;
pub use scan::{find_capture_files, scan_directory};
