//! Per-call parse context.
//!
//! The only state that travels down a recursive parse (archive → entry,
//! manifest → listed file) is the creation time of the thing being decoded,
//! the chain of containers above it and an optional cancellation flag. It is
//! passed by value at every level and never stored on the parser.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use capture_core::error::{ParseError, Result};
use capture_core::options::{capture_epoch, CaptureOptions};
use chrono::{DateTime, Duration, Utc};

/// How many archives and manifests may be nested inside one another.
pub const MAX_NESTING: usize = 8;

#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Creation time of the file or archive entry being decoded.
    pub creation_time: DateTime<Utc>,
    cancel: Option<Arc<AtomicBool>>,
    depth: usize,
    /// Manifests currently being expanded, outermost first.
    manifests: Vec<PathBuf>,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(capture_epoch())
    }
}

impl ParseContext {
    pub fn new(creation_time: DateTime<Utc>) -> Self {
        Self {
            creation_time,
            cancel: None,
            depth: 0,
            manifests: Vec::new(),
        }
    }

    /// Attach a flag that, once set, stops archive and manifest scans
    /// between entries.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Context for a nested file: same cancellation flag, new creation time.
    pub fn with_creation_time(&self, creation_time: DateTime<Utc>) -> Self {
        Self {
            creation_time,
            ..self.clone()
        }
    }

    /// Number of containers enclosing the file being decoded.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context for the entries of an archive.
    ///
    /// Fails once [`MAX_NESTING`] containers are open.
    pub fn enter_archive(&self, path: &Path) -> Result<Self> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::malformed(format!(
                "{} is nested more than {} containers deep",
                path.display(),
                MAX_NESTING
            )));
        }
        Ok(Self {
            depth: self.depth + 1,
            ..self.clone()
        })
    }

    /// Context for the files listed by a manifest.
    ///
    /// Fails when the manifest is already being expanded further up, so a
    /// manifest that lists itself (directly or through others) is cut off.
    pub fn enter_manifest(&self, path: &Path) -> Result<Self> {
        let mut nested = self.enter_archive(path)?;
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if nested.manifests.contains(&key) {
            return Err(ParseError::malformed(format!(
                "{} lists itself through {} manifests",
                path.display(),
                nested.manifests.len()
            )));
        }
        nested.manifests.push(key);
        Ok(nested)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ParseError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Default capture window starting at this context's creation time.
    pub fn default_options(&self, window: Duration) -> CaptureOptions {
        CaptureOptions::resolve(self.creation_time, window)
    }
}
