//! Line-delimited device logs, one `[kind, ...]` record per line.
//!
//! Logs carry no capture window of their own. The window is estimated from
//! the number of accelerometer samples and the sample rate the firmware
//! announces through its timestamp flags.

use std::path::Path;

use capture_core::error::{ParseError, Result};
use capture_core::literal::parse_pseudo_json;
use capture_core::models::{DeviceType, SensorRecord, Timestamp};
use capture_core::sensor::{normalize, SensorKind};
use serde_json::Value;
use tracing::{debug, trace};

use super::{default_device_capture, Decoded};
use crate::context::ParseContext;
use crate::parser::CaptureParser;

/// Sample rate assumed until a timestamp says otherwise.
const INITIAL_RATE_HZ: f64 = 4.0;
const PASSIVE_RATE_HZ: f64 = 4.0;
const SLEEP_RATE_HZ: f64 = 1.0;
const FAST_RATE_HZ: f64 = 20.0;

/// Running estimate of how much wall time a log covers.
#[derive(Debug, Clone, PartialEq)]
pub struct RateEstimator {
    rate_hz: f64,
    elapsed_secs: f64,
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self {
            rate_hz: INITIAL_RATE_HZ,
            elapsed_secs: 0.0,
        }
    }
}

impl RateEstimator {
    pub fn on_accelerometer(&mut self) {
        self.elapsed_secs += 1.0 / self.rate_hz;
    }

    /// Debug timestamps never change the rate.
    pub fn on_timestamp(&mut self, ts: &Timestamp) {
        if ts.debug {
            return;
        }
        if ts.passive {
            self.rate_hz = PASSIVE_RATE_HZ;
        } else if ts.sleep {
            self.rate_hz = SLEEP_RATE_HZ;
        } else if ts.fast_rate {
            self.rate_hz = FAST_RATE_HZ;
        }
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }
}

pub fn decode(
    parser: &CaptureParser,
    path: &Path,
    content: &[u8],
    ctx: &ParseContext,
) -> Result<Decoded> {
    let text = std::str::from_utf8(content)
        .map_err(|e| ParseError::malformed(format!("{} is not UTF-8: {}", path.display(), e)))?;

    let mut estimator = RateEstimator::default();
    let mut sensors = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = read_line(line).map_err(|e| at_line(line_no + 1, e))?;

        match &record {
            SensorRecord::Accelerometer { .. } => estimator.on_accelerometer(),
            SensorRecord::Timestamp(ts) => {
                estimator.on_timestamp(ts);
                trace!("line {}: rate now {} Hz", line_no + 1, estimator.rate_hz());
            }
            _ => {}
        }
        sensors.push(record);
    }

    debug!(
        "{}: {} records, ~{:.2}s of accelerometer data",
        path.display(),
        sensors.len(),
        estimator.elapsed_secs()
    );

    let mut capture = default_device_capture(parser, sensors, DeviceType::Wristband, ctx);
    capture.options = capture.options.with_duration(estimator.elapsed_secs());
    Ok(Decoded::single(capture))
}

/// Normalize one `[kind, ...]` log line.
fn read_line(line: &str) -> Result<SensorRecord> {
    let items = match parse_pseudo_json(line)? {
        Value::Array(items) => items,
        other => {
            return Err(ParseError::malformed(format!(
                "log record must be a list, got {}",
                other
            )))
        }
    };

    let Some((Value::String(tag), rest)) = items.split_first() else {
        return Err(ParseError::malformed("log record has no kind tag"));
    };

    // Only these tags carry a single payload element; every other kind
    // (including `debug`) spreads its payload over the rest of the line.
    let single = matches!(tag.as_str(), "accelerometer" | "timestamp" | "temperature");
    let payload = if single {
        rest.first()
            .cloned()
            .ok_or_else(|| ParseError::malformed(format!("{} record has no payload", tag)))?
    } else {
        Value::Array(rest.to_vec())
    };

    normalize(&SensorKind::from_tag(tag), &payload)
}

/// Prefix a line number, keeping a single `Malformed content:` prefix.
fn at_line(line_no: usize, err: ParseError) -> ParseError {
    match err {
        ParseError::MalformedContent(msg) => ParseError::malformed(format!("line {}: {}", line_no, msg)),
        other => ParseError::malformed(format!("line {}: {}", line_no, other)),
    }
}
