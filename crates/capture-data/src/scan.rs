//! Directory scanning for batch ingestion.

use std::path::{Path, PathBuf};

use capture_core::error::{ParseError, Result};
use capture_core::models::ParseOutcome;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::formats::Format;
use crate::parser::CaptureParser;

/// Find every file with a supported capture extension under `dir`, sorted by
/// path. Hidden files and directories are skipped.
pub fn find_capture_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(ParseError::FileAccess {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "directory does not exist"),
        });
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && Format::from_path(entry.path()).is_some())
        .map(DirEntry::into_path)
        .collect();

    files.sort();
    Ok(files)
}

/// Parse every capture file under `dir`.
///
/// Files that fail to parse are logged and skipped, as are files that yield
/// no captures. Cancellation stops the scan.
pub fn scan_directory(parser: &CaptureParser, dir: &Path) -> Result<Vec<ParseOutcome>> {
    let files = find_capture_files(dir)?;
    if files.is_empty() {
        warn!("No capture files found in {}", dir.display());
        return Ok(Vec::new());
    }

    let mut outcomes = Vec::new();
    for path in &files {
        match parser.parse(path, None) {
            Ok(outcome) if outcome.is_empty() => {
                debug!("{} produced no captures", path.display());
            }
            Ok(outcome) => outcomes.push(outcome),
            Err(ParseError::Cancelled) => return Err(ParseError::Cancelled),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    info!(
        "Parsed {} of {} capture files in {}",
        outcomes.len(),
        files.len(),
        dir.display()
    );
    Ok(outcomes)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
