use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Default length of a capture window when nothing better is known.
pub const DEFAULT_WINDOW_SECS: u32 = 30;

/// Creation time assumed when a capture arrives with no file metadata.
pub fn capture_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1981, 6, 12, 4, 25, 21)
        .single()
        .map(|dt| dt + Duration::milliseconds(565))
        .unwrap_or_default()
}

// ── CaptureOptions ────────────────────────────────────────────────────────────

/// The time window of one capture, as the ingestion engine expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub requires_shoepod: bool,
}

impl CaptureOptions {
    /// Default window: starts at `creation_time` and lasts `window`.
    pub fn resolve(creation_time: DateTime<Utc>, window: Duration) -> Self {
        Self {
            start_timestamp: creation_time,
            end_timestamp: creation_time + window,
            requires_shoepod: false,
        }
    }

    /// Replace the end of the window with `start + seconds`.
    ///
    /// Non-positive estimates leave the window untouched.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        if seconds > 0.0 && seconds.is_finite() {
            let nanos = (seconds * 1e9).round() as i64;
            self.end_timestamp = self.start_timestamp + Duration::nanoseconds(nanos);
        }
        self
    }

    /// Apply the `options` object of a capture envelope on top of `self`.
    ///
    /// Each field overrides individually; unparsable timestamps are logged and
    /// ignored.
    pub fn with_overrides(mut self, raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return self;
        };

        if let Some(v) = obj.get("start_timestamp") {
            match TimestampProcessor::parse(v) {
                Some(ts) => self.start_timestamp = ts,
                None => warn!("ignoring unparsable start_timestamp {}", v),
            }
        }
        if let Some(v) = obj.get("end_timestamp") {
            match TimestampProcessor::parse(v) {
                Some(ts) => self.end_timestamp = ts,
                None => warn!("ignoring unparsable end_timestamp {}", v),
            }
        }
        if let Some(flag) = obj.get("requires_shoepod").and_then(truthy) {
            self.requires_shoepod = flag;
        }
        self
    }

    /// Length of the capture window.
    pub fn duration(&self) -> Duration {
        self.end_timestamp - self.start_timestamp
    }
}

fn truthy(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        _ => None,
    }
}

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses capture-window timestamps from the formats found in envelopes.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to parse a [`serde_json::Value`] into a UTC [`DateTime`].
    ///
    /// Handles:
    /// * `null`       → `None`
    /// * JSON string  → RFC 3339 (including `Z`-suffix) or naive ISO forms,
    ///   which are taken as UTC.
    /// * JSON number  → Unix timestamp (integer or float seconds).
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Null => None,
            Value::String(s) => Self::parse_str(s.as_str()),
            Value::Number(n) => {
                if let Some(secs) = n.as_i64() {
                    DateTime::from_timestamp(secs, 0)
                } else if let Some(f) = n.as_f64() {
                    let secs = f.trunc() as i64;
                    let nanos = (f.fract() * 1_000_000_000.0).round() as u32;
                    DateTime::from_timestamp(secs, nanos)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        // Replace trailing 'Z' with '+00:00' for RFC 3339 compatibility.
        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        // Space-separated with offset: "1981-06-12 04:25:51.565000+00:00"
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        debug!(
            "TimestampProcessor: could not parse timestamp string \"{}\"",
            s
        );
        None
    }
}
