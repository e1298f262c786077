//! The parse orchestrator: path in, canonical captures out.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use capture_core::config::ParserConfig;
use capture_core::error::{ParseError, Result};
use capture_core::label::{base_name, label_for_path};
use capture_core::models::ParseOutcome;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::context::ParseContext;
use crate::formats::{Decoded, Format};

/// Turns capture files of any supported format into [`ParseOutcome`]s.
///
/// The parser holds only configuration. Everything that varies during a
/// recursive parse lives in the [`ParseContext`] passed down each call, so a
/// single parser can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct CaptureParser {
    config: ParserConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl CaptureParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Share a flag that aborts archive and manifest scans once set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a capture file.
    ///
    /// With `content` absent the file is read from disk and its filesystem
    /// creation time anchors the default capture window. With `content`
    /// present the path only selects the decoder and label.
    ///
    /// Under the lenient policy unknown extensions and malformed content
    /// yield an empty outcome. A missing file is always an error.
    pub fn parse(&self, path: &Path, content: Option<&[u8]>) -> Result<ParseOutcome> {
        let mut ctx = ParseContext::default();
        if let Some(flag) = &self.cancel {
            ctx = ctx.with_cancel_flag(Arc::clone(flag));
        }
        self.parse_with_context(path, content, &ctx)
    }

    /// [`parse`](Self::parse) with an explicit context, e.g. a known creation
    /// time for in-memory content.
    pub fn parse_with_context(
        &self,
        path: &Path,
        content: Option<&[u8]>,
        ctx: &ParseContext,
    ) -> Result<ParseOutcome> {
        let decoded = match self.load(path, content, ctx) {
            Ok(decoded) => decoded,
            Err(e) if self.absorbs(&e) => {
                self.report_skipped(path, &e);
                Decoded::default()
            }
            Err(e) => return Err(e),
        };

        let label = decoded
            .label_override
            .unwrap_or_else(|| label_for_path(path));

        Ok(ParseOutcome {
            captures: decoded.captures,
            label,
            path: path.to_path_buf(),
            name: stem(path),
        })
    }

    /// Read (if needed) and decode one file without applying the policy.
    ///
    /// Containers call this for each entry so that they can isolate entry
    /// failures themselves.
    pub(crate) fn load(
        &self,
        path: &Path,
        content: Option<&[u8]>,
        ctx: &ParseContext,
    ) -> Result<Decoded> {
        let format =
            Format::from_path(path).ok_or_else(|| ParseError::UnknownFormat(base_name(path)));

        match content {
            Some(bytes) => format?.decode(self, path, bytes, ctx),
            None => {
                let created = creation_time(path)?;
                let format = format?;
                let bytes = std::fs::read(path).map_err(|source| ParseError::FileAccess {
                    path: path.to_path_buf(),
                    source,
                })?;
                debug!("Read {} ({} bytes, {:?})", path.display(), bytes.len(), format);
                format.decode(self, path, &bytes, &ctx.with_creation_time(created))
            }
        }
    }

    fn absorbs(&self, err: &ParseError) -> bool {
        !self.config.is_strict() && (matches!(err, ParseError::UnknownFormat(_)) || err.is_malformed())
    }

    /// Log a file or entry that produced nothing.
    ///
    /// Hidden files (`.DS_Store`, `__MACOSX/._*`) are expected noise and only
    /// ever logged at debug level.
    pub(crate) fn report_skipped(&self, path: &Path, err: &ParseError) {
        if self.config.verbosity > 0 && !base_name(path).starts_with('.') {
            warn!("Ignoring {}: {}", path.display(), err);
        } else {
            debug!("Ignoring {}: {}", path.display(), err);
        }
    }
}

/// Filesystem creation time, falling back to modification time where the
/// platform does not record creation.
fn creation_time(path: &Path) -> Result<DateTime<Utc>> {
    let metadata = std::fs::metadata(path).map_err(|source| ParseError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let stamp = metadata
        .created()
        .or_else(|_| metadata.modified())
        .map_err(|source| ParseError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(DateTime::<Utc>::from(stamp))
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::models::{DeviceType, SensorRecord, DEFAULT_DEVICE};
    use capture_core::options::capture_epoch;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn lenient() -> CaptureParser {
        CaptureParser::new(ParserConfig::default())
    }

    #[test]
    fn test_missing_file_is_file_access_error() {
        let err = lenient().parse(Path::new("missing.json"), None).unwrap_err();
        assert!(matches!(err, ParseError::FileAccess { .. }));

        let err = lenient().parse(Path::new("missing.txt"), None).unwrap_err();
        assert!(matches!(err, ParseError::FileAccess { .. }));
    }

    #[test]
    fn test_unknown_extension_is_empty_when_lenient() {
        let outcome = lenient()
            .parse(Path::new("notes_REF.txt"), Some(b"hello"))
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.label, "notes");
        assert_eq!(outcome.path, PathBuf::from("notes_REF.txt"));
    }

    #[test]
    fn test_malformed_is_empty_when_lenient() {
        let outcome = lenient()
            .parse(Path::new("broken.json"), Some(b"{\"data\": ["))
            .unwrap();
        assert!(outcome.is_empty());
        assert_eq!(outcome.label, "broken.json");
    }

    #[test]
    fn test_strict_policy_propagates() {
        let parser = CaptureParser::new(ParserConfig::strict());
        let err = parser
            .parse(Path::new("broken.json"), Some(b"{\"data\": ["))
            .unwrap_err();
        assert!(err.is_malformed());

        let err = parser.parse(Path::new("notes.txt"), Some(b"")).unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat(name) if name == "notes.txt"));
    }

    #[test]
    fn test_in_memory_content_uses_context_time() {
        let outcome = lenient()
            .parse(Path::new("Walk-Fast_REF_1.CSV"), Some(b"1,2,3\n"))
            .unwrap();

        assert_eq!(outcome.label, "walk-fast");
        assert_eq!(outcome.name, "walk-fast_ref_1");
        assert_eq!(outcome.captures.len(), 1);
        assert_eq!(outcome.captures[0].options.start_timestamp, capture_epoch());
    }

    #[test]
    fn test_explicit_context_time() {
        let when = DateTime::parse_from_rfc3339("2023-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let outcome = lenient()
            .parse_with_context(Path::new("a.csv"), Some(b"1,2,3\n"), &ParseContext::new(when))
            .unwrap();
        assert_eq!(outcome.captures[0].options.start_timestamp, when);
    }

    #[test]
    fn test_file_on_disk_uses_filesystem_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Jog_REF.csv");
        fs::write(&path, "x,y,z\n1,2,3\n").unwrap();

        let outcome = lenient().parse(&path, None).unwrap();
        assert_eq!(outcome.label, "jog");
        let capture = &outcome.captures[0];
        assert_ne!(capture.options.start_timestamp, capture_epoch());
        let device = capture.session.get(DEFAULT_DEVICE).unwrap();
        assert_eq!(device.device_type, DeviceType::Wristband);
        assert_eq!(device.sensors, vec![SensorRecord::Accelerometer { x: 1, y: 2, z: 3 }]);
    }

    #[test]
    fn test_envelope_name_overrides_label() {
        let body = br#"[{"name": "Stairs", "data_sets": []}]"#;
        let outcome = lenient().parse(Path::new("x_REF.json"), Some(body)).unwrap();
        assert_eq!(outcome.label, "Stairs");
    }

    #[test]
    fn test_configured_device_name_and_window() {
        let config = ParserConfig {
            default_device: "Wrist".to_string(),
            default_window_secs: 60,
            ..ParserConfig::default()
        };
        let outcome = CaptureParser::new(config)
            .parse(Path::new("a.csv"), Some(b"1,2,3\n"))
            .unwrap();
        let capture = &outcome.captures[0];
        assert!(capture.session.get("Wrist").is_some());
        assert_eq!(capture.options.duration(), chrono::Duration::seconds(60));
    }
}
