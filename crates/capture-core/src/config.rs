use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ParseError, Result};
use crate::models::DEFAULT_DEVICE;
use crate::options::DEFAULT_WINDOW_SECS;

// ── ParsePolicy ───────────────────────────────────────────────────────────────

/// What the parser does with files it cannot use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Unknown formats and malformed content yield an empty result, so mixed
    /// directories can be scanned in one pass. Missing files still fail.
    #[default]
    Lenient,
    /// Every failure is returned to the caller.
    Strict,
}

// ── ParserConfig ──────────────────────────────────────────────────────────────

/// Parser configuration, optionally persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub policy: ParsePolicy,
    /// Capture window length used when a format carries no duration.
    pub default_window_secs: u32,
    /// Device name for formats that carry no device information.
    pub default_device: String,
    /// 0 logs skipped files at debug level only; higher values warn.
    pub verbosity: u8,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            policy: ParsePolicy::Lenient,
            default_window_secs: DEFAULT_WINDOW_SECS,
            default_device: DEFAULT_DEVICE.to_string(),
            verbosity: 0,
        }
    }
}

impl ParserConfig {
    pub fn strict() -> Self {
        Self {
            policy: ParsePolicy::Strict,
            ..Self::default()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.policy == ParsePolicy::Strict
    }

    pub fn default_window(&self) -> Duration {
        Duration::seconds(i64::from(self.default_window_secs))
    }

    /// Load a config from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Persist a validated config as JSON, creating parent directories.
    ///
    /// The file is staged next to `path` and renamed into place, so readers
    /// never see a partial config.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let access = |source| ParseError::FileAccess {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(access)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        let staged = path.with_extension("json.partial");
        std::fs::write(&staged, json).map_err(access)?;
        std::fs::rename(&staged, path).map_err(access)
    }

    /// Reject values the decoders cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.default_window_secs == 0 {
            return Err(ParseError::Config(
                "default_window_secs must be at least 1".to_string(),
            ));
        }
        if self.default_device.trim().is_empty() {
            return Err(ParseError::Config(
                "default_device must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
