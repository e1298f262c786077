//! One decoder per supported capture file extension.
//!
//! Every decoder has the same shape: it receives the parser (for
//! configuration and, in containers, recursion), the path (for context only),
//! the raw bytes and the parse context, and returns the captures it found.

use std::path::Path;

use capture_core::error::{ParseError, Result};
use capture_core::models::{Capture, DeviceCapture, DeviceType, SensorRecord, Session};
use capture_core::sensor::{normalize, SensorKind};
use serde_json::Value;

use crate::context::ParseContext;
use crate::parser::CaptureParser;

pub mod archive;
pub mod csv;
pub mod json;
pub mod log;
pub mod manifest;

/// Output of a single decoder run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub captures: Vec<Capture>,
    /// Label supplied by the content itself (JSON envelope `name`), which
    /// replaces the file-name label.
    pub label_override: Option<String>,
}

impl Decoded {
    pub fn single(capture: Capture) -> Self {
        Self {
            captures: vec![capture],
            label_override: None,
        }
    }
}

/// Supported capture formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Log,
    Manifest,
    Archive,
}

impl Format {
    /// Case-insensitive extension lookup.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "log" => Some(Self::Log),
            "lst" => Some(Self::Manifest),
            "zip" => Some(Self::Archive),
            _ => None,
        }
    }

    pub fn decode(
        self,
        parser: &CaptureParser,
        path: &Path,
        content: &[u8],
        ctx: &ParseContext,
    ) -> Result<Decoded> {
        match self {
            Self::Csv => csv::decode(parser, path, content, ctx),
            Self::Json => json::decode(parser, path, content, ctx),
            Self::Log => log::decode(parser, path, content, ctx),
            Self::Manifest => manifest::decode(parser, path, content, ctx),
            Self::Archive => archive::decode(parser, path, content, ctx),
        }
    }
}

/// A capture holding one device under the configured default name, with the
/// default window.
pub(crate) fn default_device_capture(
    parser: &CaptureParser,
    sensors: Vec<SensorRecord>,
    device_type: DeviceType,
    ctx: &ParseContext,
) -> Capture {
    let config = parser.config();
    let session = Session::single(
        config.default_device.clone(),
        DeviceCapture::new(sensors, device_type),
    );
    Capture::new(session, ctx.default_options(config.default_window()))
}

/// Convert a legacy raw accelerometer matrix (`[[x, y, z], ...]`).
///
/// Only a matrix whose first row has exactly three columns is read; each row
/// then contributes its first three values.
pub(crate) fn raw_accelerometer_records(rows: &Value) -> Result<Vec<SensorRecord>> {
    let rows = rows
        .as_array()
        .ok_or_else(|| ParseError::malformed("raw accelerometer data must be a list of rows"))?;
    let first = rows
        .first()
        .ok_or_else(|| ParseError::malformed("raw accelerometer data is empty"))?;

    if first.as_array().map(Vec::len) != Some(3) {
        return Ok(Vec::new());
    }

    rows.iter()
        .map(|row| normalize(&SensorKind::Accelerometer, row))
        .collect()
}
