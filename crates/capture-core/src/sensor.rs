//! Normalization of raw per-kind sensor payloads into [`SensorRecord`]s.
//!
//! Capture files written over the years encode the same record in several
//! ways: positional lists, mappings with optional keys, lists of
//! `[key, value]` pairs and string-quoted pseudo-JSON. Every shape goes
//! through this module so downstream code only ever sees the canonical
//! record.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::{ParseError, Result};
use crate::literal::parse_pseudo_json;
use crate::models::{SensorRecord, Timestamp};

// ── SensorKind ────────────────────────────────────────────────────────────────

/// The closed set of sensor kinds the engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    Temperature,
    /// Also covers the legacy `debug` tag.
    Timestamp,
    LightSensor,
    LightSensorConfig,
    LogCount,
    Event,
    Unknown(String),
}

impl SensorKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "accelerometer" => Self::Accelerometer,
            "temperature" => Self::Temperature,
            "timestamp" | "debug" => Self::Timestamp,
            "lightsensor" => Self::LightSensor,
            "lightsensor_config" => Self::LightSensorConfig,
            "log_count" => Self::LogCount,
            "event" => Self::Event,
            other => Self::Unknown(other.to_string()),
        }
    }

}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Normalize a payload given its textual kind tag.
pub fn normalize_tagged(tag: &str, payload: &Value) -> Result<SensorRecord> {
    normalize(&SensorKind::from_tag(tag), payload)
}

/// Normalize one raw payload of the given kind.
///
/// Unknown kinds are kept verbatim and never fail.
pub fn normalize(kind: &SensorKind, payload: &Value) -> Result<SensorRecord> {
    match kind {
        SensorKind::Accelerometer => accelerometer(expand(payload)?.as_ref()),
        SensorKind::Temperature => temperature(expand(payload)?.as_ref()),
        SensorKind::Timestamp => timestamp(expand(payload)?.as_ref()).map(SensorRecord::Timestamp),
        SensorKind::LightSensor => light_sensor(expand(payload)?.as_ref()),
        SensorKind::LightSensorConfig => light_sensor_config(expand(payload)?.as_ref()),
        SensorKind::LogCount => log_count(expand(payload)?.as_ref()),
        SensorKind::Event => event(expand(payload)?.as_ref()),
        SensorKind::Unknown(tag) => Ok(SensorRecord::Unknown {
            kind: tag.clone(),
            raw: payload.clone(),
        }),
    }
}

/// Decode string-quoted payloads; every other shape is used as is.
fn expand(payload: &Value) -> Result<Cow<'_, Value>> {
    match payload {
        Value::String(s) => Ok(Cow::Owned(parse_pseudo_json(s)?)),
        other => Ok(Cow::Borrowed(other)),
    }
}

// ── Per-kind decoders ─────────────────────────────────────────────────────────

fn accelerometer(payload: &Value) -> Result<SensorRecord> {
    let (x, y, z) = match payload {
        Value::Array(items) if items.len() >= 3 => (
            number(&items[0]),
            number(&items[1]),
            number(&items[2]),
        ),
        Value::Object(map) => (
            map.get("x").and_then(number),
            map.get("y").and_then(number),
            map.get("z").and_then(number),
        ),
        other => {
            return Err(ParseError::malformed(format!(
                "accelerometer payload must hold three axes, got {}",
                other
            )))
        }
    };

    match (x, y, z) {
        (Some(x), Some(y), Some(z)) => Ok(SensorRecord::Accelerometer {
            x: to_i16(x),
            y: to_i16(y),
            z: to_i16(z),
        }),
        _ => Err(ParseError::malformed(format!(
            "accelerometer axes must be numeric, got {}",
            payload
        ))),
    }
}

fn temperature(payload: &Value) -> Result<SensorRecord> {
    let celsius = match payload {
        Value::Object(map) => map.get("celsius").and_then(number),
        other => number(other),
    };
    celsius
        .map(|celsius| SensorRecord::Temperature { celsius })
        .ok_or_else(|| ParseError::malformed(format!("temperature payload {} has no celsius", payload)))
}

/// Pick the timestamp shim matching the payload shape.
fn timestamp(payload: &Value) -> Result<Timestamp> {
    match payload {
        Value::Number(_) | Value::Bool(_) => {
            let seconds = number(payload).unwrap_or(0.0);
            Ok(timestamp_from_seconds(seconds))
        }
        // A lone payload wrapped in a list, as written by some log exports.
        Value::Array(items) if items.len() == 1 => timestamp(&items[0]),
        // Anything after `[ticks, flags]` is ignored.
        Value::Array(items) if items.len() >= 2 => match (integer(&items[0]), integer(&items[1])) {
            (Some(ticks), Some(flags)) => Ok(timestamp_from_ticks_and_flags(ticks, flags)),
            _ => Err(ParseError::malformed(format!(
                "timestamp pair must be numeric, got {}",
                payload
            ))),
        },
        Value::Object(map) => timestamp_from_fields(map),
        other => Err(ParseError::malformed(format!(
            "unsupported timestamp payload {}",
            other
        ))),
    }
}

/// Legacy scalar form: the payload is the device time in seconds.
pub fn timestamp_from_seconds(seconds: f64) -> Timestamp {
    let ticks = wrap_u32((seconds * 128.0).trunc() as i64);
    Timestamp::from_flags(ticks, 0, seconds, seconds.trunc() as i64)
}

/// Legacy `[ticks, flags]` form.
pub fn timestamp_from_ticks_and_flags(ticks: i64, flags: i64) -> Timestamp {
    Timestamp::from_flags(wrap_u32(ticks), flags as u8, ticks as f64 / 128.0, ticks)
}

/// Mapping form: every field optional, flag booleans derived from `flags`
/// when absent.
pub fn timestamp_from_fields(map: &Map<String, Value>) -> Result<Timestamp> {
    let flags = optional_integer(map, "flags", "timestamp")?.unwrap_or(0) as u8;
    let seconds = match map.get("seconds") {
        Some(v) => number(v).ok_or_else(|| bad_field("timestamp", "seconds", v))?,
        None => 0.0,
    };
    let ticks = optional_integer(map, "ticks", "timestamp")?.unwrap_or(0);
    let errcode = optional_integer(map, "errcode", "timestamp")?.unwrap_or(0);

    let mut ts = Timestamp::from_flags(wrap_u32(ticks), flags, seconds, errcode);
    if let Some(v) = map.get("reboot").and_then(truthy) {
        ts.reboot = v;
    }
    if let Some(v) = map.get("debug").and_then(truthy) {
        ts.debug = v;
    }
    if let Some(v) = map.get("fast_rate").and_then(truthy) {
        ts.fast_rate = v;
    }
    if let Some(v) = map.get("sleep").and_then(truthy) {
        ts.sleep = v;
    }
    if let Some(v) = map.get("passive").and_then(truthy) {
        ts.passive = v;
    }
    Ok(ts)
}

fn light_sensor(payload: &Value) -> Result<SensorRecord> {
    let map = mapping(payload, "lightsensor")?;
    Ok(SensorRecord::LightSensor {
        ir: optional_integer(&map, "ir", "lightsensor")?.unwrap_or(0),
        red: optional_integer(&map, "red", "lightsensor")?.unwrap_or(0),
        off: optional_integer(&map, "off", "lightsensor")?.unwrap_or(0),
    })
}

fn light_sensor_config(payload: &Value) -> Result<SensorRecord> {
    const KIND: &str = "lightsensor_config";
    let map = mapping(payload, KIND)?;
    let flags = match optional_integer(&map, "flags", KIND)? {
        Some(flags) => flags,
        None => optional_integer(&map, "reserved", KIND)?.unwrap_or(0),
    };

    Ok(SensorRecord::LightSensorConfig {
        dac_on: required_integer(&map, "dac_on", KIND)?,
        gain: required_integer(&map, "gain", KIND)?,
        level_led: required_integer(&map, "level_led", KIND)?,
        log_size: required_integer(&map, "log_size", KIND)?,
        flags,
        manual: map.get("manual").and_then(truthy).unwrap_or(flags & 0x01 != 0),
        worn: map.get("worn").and_then(truthy).unwrap_or(flags & 0x02 != 0),
    })
}

fn log_count(payload: &Value) -> Result<SensorRecord> {
    const KIND: &str = "log_count";
    let map = mapping(payload, KIND)?;
    Ok(SensorRecord::LogCount {
        log_timestamp: wrap_u32(required_integer(&map, "log_timestamp", KIND)?),
        log_accel_count: required_integer(&map, "log_accel_count", KIND)? as u16,
        old_timestamp: wrap_u32(required_integer(&map, "old_timestamp", KIND)?),
        timestamp: wrap_u32(required_integer(&map, "timestamp", KIND)?),
    })
}

fn event(payload: &Value) -> Result<SensorRecord> {
    let map = mapping(payload, "event")?;
    Ok(SensorRecord::Event {
        flags: required_integer(&map, "flags", "event")? as u8,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// View a payload as a key/value mapping.
///
/// Accepts a JSON object or a list of `[key, value]` pairs; later pairs win.
fn mapping(payload: &Value, kind: &str) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map.clone()),
        Value::Array(items) => {
            let mut map = Map::new();
            for item in items {
                match item.as_array().map(Vec::as_slice) {
                    Some([Value::String(key), value]) => {
                        map.insert(key.clone(), value.clone());
                    }
                    _ => {
                        return Err(ParseError::malformed(format!(
                            "{} payload entries must be [key, value] pairs, got {}",
                            kind, item
                        )))
                    }
                }
            }
            Ok(map)
        }
        other => Err(ParseError::malformed(format!(
            "{} payload must be a mapping, got {}",
            kind, other
        ))),
    }
}

fn required_integer(map: &Map<String, Value>, key: &str, kind: &str) -> Result<i64> {
    optional_integer(map, key, kind)?
        .ok_or_else(|| ParseError::malformed(format!("{} is missing {}", kind, key)))
}

fn optional_integer(map: &Map<String, Value>, key: &str, kind: &str) -> Result<Option<i64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => integer(v).map(Some).ok_or_else(|| bad_field(kind, key, v)),
    }
}

fn bad_field(kind: &str, key: &str, value: &Value) -> ParseError {
    ParseError::malformed(format!("{}.{} is not numeric: {}", kind, key, value))
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u as i64))
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        other => number(other).map(|f| f.trunc() as i64),
    }
}

fn truthy(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::Null => Some(false),
        _ => None,
    }
}

/// Truncate toward zero, then keep the low 16 bits.
fn to_i16(v: f64) -> i16 {
    v.trunc() as i64 as i16
}

fn wrap_u32(v: i64) -> u32 {
    v as u32
}
