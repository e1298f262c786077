//! JSON captures in every schema generation the platform has exported.
//!
//! 1. Multi-session envelope: `[{"name": ..., "data_sets": [envelope, ...]}]`.
//! 2. Envelope: `{"data": {device: {"sensors": ..., "type": ...}}, "options": ..., "pk": ...}`,
//!    either at the top level or as the single element of a list.
//! 3. Legacy raw arrays: `{"accelerometer": rows}`, `{"accel": rows}` or
//!    `{"devices": {"0" | "1": rows}}`.

use std::path::Path;

use capture_core::error::{ParseError, Result};
use capture_core::models::{Capture, DeviceCapture, DeviceType, SensorRecord, Session};
use capture_core::sensor::{normalize, normalize_tagged, SensorKind};
use serde_json::{Map, Value};
use tracing::debug;

use super::{default_device_capture, raw_accelerometer_records, Decoded};
use crate::context::ParseContext;
use crate::parser::CaptureParser;

pub fn decode(
    parser: &CaptureParser,
    path: &Path,
    content: &[u8],
    ctx: &ParseContext,
) -> Result<Decoded> {
    let input: Value = serde_json::from_slice(content)?;

    match &input {
        Value::Array(items) => {
            let first = items
                .first()
                .ok_or_else(|| ParseError::malformed("top-level JSON list is empty"))?;
            match first.get("data_sets") {
                Some(sets) => read_data_sets(parser, first, sets, ctx),
                None => Ok(Decoded::single(read_envelope(parser, first, ctx)?)),
            }
        }
        Value::Object(map) if map.contains_key("data") => {
            Ok(Decoded::single(read_envelope(parser, &input, ctx)?))
        }
        Value::Object(map) => read_legacy(parser, path, map, ctx),
        other => Err(ParseError::malformed(format!(
            "unsupported JSON capture root: {}",
            type_name(other)
        ))),
    }
}

fn read_data_sets(
    parser: &CaptureParser,
    container: &Value,
    sets: &Value,
    ctx: &ParseContext,
) -> Result<Decoded> {
    let sets = sets
        .as_array()
        .ok_or_else(|| ParseError::malformed("data_sets must be a list"))?;

    let captures = sets
        .iter()
        .map(|set| read_envelope(parser, set, ctx))
        .collect::<Result<Vec<_>>>()?;

    // Only plain ASCII names may replace the file label.
    let label_override = container
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| name.is_ascii())
        .map(str::to_string);

    Ok(Decoded {
        captures,
        label_override,
    })
}

/// Read one `{data, options, pk?}` envelope.
fn read_envelope(parser: &CaptureParser, set: &Value, ctx: &ParseContext) -> Result<Capture> {
    let data = set
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| ParseError::malformed("envelope has no data object"))?;

    let mut session = Session::new();
    for (device_name, device) in data {
        session.insert(device_name.clone(), read_device(device_name, device)?);
    }

    let mut options = ctx.default_options(parser.config().default_window());
    if let Some(raw) = set.get("options") {
        options = options.with_overrides(raw);
    }

    let primary_key = match set.get("pk") {
        Some(Value::String(pk)) => Some(pk.clone()),
        Some(Value::Number(pk)) => Some(pk.to_string()),
        _ => None,
    };

    Ok(Capture {
        session,
        options,
        primary_key,
    })
}

fn read_device(name: &str, device: &Value) -> Result<DeviceCapture> {
    let sensors = device
        .get("sensors")
        .ok_or_else(|| ParseError::malformed(format!("device {} has no sensors", name)))?;

    let records = match sensors {
        Value::Array(pairs) => pairs
            .iter()
            .map(read_tagged_pair)
            .collect::<Result<Vec<_>>>()?,
        // Non-flattened format: only accelerometer lists were ever exported.
        Value::Object(by_kind) => match by_kind.get("accelerometer") {
            Some(Value::Array(samples)) => samples
                .iter()
                .map(|sample| normalize(&SensorKind::Accelerometer, sample))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(ParseError::malformed(format!(
                    "device {} accelerometer must be a list, got {}",
                    name,
                    type_name(other)
                )))
            }
            None => Vec::new(),
        },
        other => {
            return Err(ParseError::malformed(format!(
                "device {} sensors must be a list or mapping, got {}",
                name,
                type_name(other)
            )))
        }
    };

    let device_type = match device.get("type").and_then(Value::as_str) {
        Some(kind) => DeviceType::from_type_str(kind),
        None => DeviceType::infer_from_name(name),
    };

    Ok(DeviceCapture::new(records, device_type))
}

/// Flattened sensors are `[kind, payload]` pairs.
fn read_tagged_pair(pair: &Value) -> Result<SensorRecord> {
    match pair.as_array().map(Vec::as_slice) {
        Some([Value::String(kind), payload, ..]) => normalize_tagged(kind, payload),
        _ => Err(ParseError::malformed(format!(
            "sensor entry must be [kind, payload], got {}",
            pair
        ))),
    }
}

fn read_legacy(
    parser: &CaptureParser,
    path: &Path,
    map: &Map<String, Value>,
    ctx: &ParseContext,
) -> Result<Decoded> {
    let (rows, device_type) = if let Some(rows) = map.get("accelerometer").or_else(|| map.get("accel")) {
        (rows, DeviceType::Wristband)
    } else if let Some(devices) = map.get("devices") {
        ["0", "1"]
            .iter()
            .find_map(|index| {
                let rows = devices.get(*index)?;
                Some((rows, DeviceType::from_legacy_index(index)?))
            })
            .ok_or_else(|| ParseError::malformed("legacy devices object has neither \"0\" nor \"1\""))?
    } else {
        return Err(ParseError::malformed(format!(
            "{} matches no known JSON capture schema",
            path.display()
        )));
    };

    let sensors = raw_accelerometer_records(rows)?;
    debug!(
        "{}: legacy {} capture with {} samples",
        path.display(),
        device_type,
        sensors.len()
    );

    Ok(Decoded::single(default_device_capture(
        parser,
        sensors,
        device_type,
        ctx,
    )))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::config::ParserConfig;
    use capture_core::models::DEFAULT_DEVICE;
    use capture_core::options::capture_epoch;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::path::PathBuf;

    fn run(input: Value) -> Result<Decoded> {
        let parser = CaptureParser::new(ParserConfig::default());
        decode(
            &parser,
            &PathBuf::from("capture.json"),
            input.to_string().as_bytes(),
            &ParseContext::default(),
        )
    }

    #[test]
    fn test_legacy_devices_one_is_shoepod() {
        let decoded = run(json!({"devices": {"1": [[1, 2, 3]]}})).unwrap();
        let device = decoded.captures[0].session.get(DEFAULT_DEVICE).unwrap();
        assert_eq!(device.device_type, DeviceType::Shoepod);
        assert_eq!(device.sensors.len(), 1);
    }

    #[test]
    fn test_legacy_devices_zero_is_wristband() {
        let decoded = run(json!({"devices": {"0": [[1, 2, 3]], "1": [[4, 5, 6]]}})).unwrap();
        let device = decoded.captures[0].session.get(DEFAULT_DEVICE).unwrap();
        assert_eq!(device.device_type, DeviceType::Wristband);
        assert_eq!(device.sensors, vec![SensorRecord::Accelerometer { x: 1, y: 2, z: 3 }]);
    }

    #[test]
    fn test_legacy_accel_alias() {
        let a = run(json!({"accelerometer": [[1, 2, 3]]})).unwrap();
        let b = run(json!({"accel": [[1, 2, 3]]})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.captures[0].options.start_timestamp, capture_epoch());
    }

    #[test]
    fn test_unrecognised_object_is_malformed() {
        assert!(run(json!({"hello": "world"})).unwrap_err().is_malformed());
        assert!(run(json!({"devices": {"7": []}})).unwrap_err().is_malformed());
        assert!(run(json!(42)).unwrap_err().is_malformed());
    }

    #[test]
    fn test_invalid_syntax_is_malformed() {
        let parser = CaptureParser::new(ParserConfig::default());
        let err = decode(
            &parser,
            &PathBuf::from("bad.json"),
            b"{\"data\": [",
            &ParseContext::default(),
        )
        .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_flat_envelope_in_list() {
        let decoded = run(json!([{
            "data": {
                "left-shoepod": {"sensors": [
                    ["accelerometer", [1, 2, 3]],
                    ["timestamp", [256, 129]],
                    ["temperature", "{'celsius': 30.5}"],
                ]},
                "Boz": {"sensors": [], "type": "amiigo-wristband"},
            },
            "options": {
                "start_timestamp": "2024-01-01T00:00:00Z",
                "end_timestamp": "2024-01-01T00:10:00Z",
            },
            "pk": 17,
        }]))
        .unwrap();

        assert_eq!(decoded.captures.len(), 1);
        let capture = &decoded.captures[0];
        assert_eq!(capture.session.device_names(), vec!["left-shoepod", "Boz"]);
        assert_eq!(capture.primary_key.as_deref(), Some("17"));
        assert_eq!(capture.options.duration(), Duration::minutes(10));
        assert_eq!(
            capture.options.start_timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );

        let shoepod = capture.session.get("left-shoepod").unwrap();
        assert_eq!(shoepod.device_type, DeviceType::Shoepod);
        assert_eq!(shoepod.sensors.len(), 3);
        assert!(shoepod.sensors[1].as_timestamp().unwrap().reboot);
        assert_eq!(shoepod.sensors[2], SensorRecord::Temperature { celsius: 30.5 });
    }

    #[test]
    fn test_top_level_envelope() {
        let decoded = run(json!({
            "data": {"Boz": {"sensors": {"accelerometer": [[1, 2, 3], "[4, 5, 6]"]}}},
            "pk": "abc",
        }))
        .unwrap();
        let capture = &decoded.captures[0];
        assert_eq!(capture.primary_key.as_deref(), Some("abc"));
        let device = capture.session.get("Boz").unwrap();
        assert_eq!(device.device_type, DeviceType::Unknown);
        assert_eq!(device.sensors[1], SensorRecord::Accelerometer { x: 4, y: 5, z: 6 });
    }

    #[test]
    fn test_legacy_mapping_without_accelerometer_is_empty() {
        let decoded = run(json!({"data": {"Boz": {"sensors": {"temperature": [30]}}}})).unwrap();
        assert!(decoded.captures[0].session.get("Boz").unwrap().sensors.is_empty());
    }

    #[test]
    fn test_multi_session_envelope_overrides_label() {
        let set = |x: i64| json!({"data": {"Boz": {"sensors": [["accelerometer", [x, 0, 0]]]}}, "options": {}});
        let decoded = run(json!([{"name": "Stairs", "data_sets": [set(1), set(2)]}])).unwrap();

        assert_eq!(decoded.label_override.as_deref(), Some("Stairs"));
        assert_eq!(decoded.captures.len(), 2);
        let xs: Vec<_> = decoded
            .captures
            .iter()
            .map(|c| c.session.get("Boz").unwrap().sensors[0].clone())
            .collect();
        assert_eq!(
            xs,
            vec![
                SensorRecord::Accelerometer { x: 1, y: 0, z: 0 },
                SensorRecord::Accelerometer { x: 2, y: 0, z: 0 },
            ]
        );
    }

    #[test]
    fn test_multi_session_without_name_keeps_label() {
        let decoded = run(json!([{"data_sets": []}])).unwrap();
        assert!(decoded.captures.is_empty());
        assert!(decoded.label_override.is_none());
    }

    #[test]
    fn test_bad_sensor_entry_is_malformed() {
        let err = run(json!([{"data": {"Boz": {"sensors": [["log_count", {}]]}}}])).unwrap_err();
        assert!(err.to_string().contains("log_count is missing"));
        let err = run(json!([{"data": {"Boz": {"sensors": [42]}}}])).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_device_without_sensors_is_malformed() {
        assert!(run(json!({"data": {"Boz": {}}})).unwrap_err().is_malformed());
    }
}
