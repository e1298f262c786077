//! Accelerometer matrices exported as CSV, one `x,y,z` sample per row.

use std::path::Path;

use ::csv::{ReaderBuilder, StringRecord, Trim};
use capture_core::error::{ParseError, Result};
use capture_core::models::{DeviceType, SensorRecord};
use capture_core::sensor::{normalize, SensorKind};
use serde_json::Value;
use tracing::debug;

use super::{default_device_capture, Decoded};
use crate::context::ParseContext;
use crate::parser::CaptureParser;

pub fn decode(
    parser: &CaptureParser,
    path: &Path,
    content: &[u8],
    ctx: &ParseContext,
) -> Result<Decoded> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content);

    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    let Some(first) = rows.first() else {
        return Err(ParseError::malformed(format!(
            "{} has no rows",
            path.display()
        )));
    };

    let skip = usize::from(is_header(first));
    let sensors = rows[skip..]
        .iter()
        .filter(|row| row.len() == 3)
        .map(row_to_accelerometer)
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "{}: {} rows, {} accelerometer samples",
        path.display(),
        rows.len() - skip,
        sensors.len()
    );

    Ok(Decoded::single(default_device_capture(
        parser,
        sensors,
        DeviceType::Wristband,
        ctx,
    )))
}

/// A first row whose first cell is not a number is a header.
fn is_header(row: &StringRecord) -> bool {
    row.get(0)
        .map(|cell| cell.parse::<f64>().is_err())
        .unwrap_or(false)
}

fn row_to_accelerometer(row: &StringRecord) -> Result<SensorRecord> {
    let axes = row
        .iter()
        .map(|cell| {
            cell.parse::<f64>()
                .map(Value::from)
                .map_err(|_| ParseError::malformed(format!("non-numeric CSV cell {:?}", cell)))
        })
        .collect::<Result<Vec<_>>>()?;
    normalize(&SensorKind::Accelerometer, &Value::Array(axes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::config::ParserConfig;
    use capture_core::models::DEFAULT_DEVICE;
    use chrono::Duration;
    use std::path::PathBuf;

    fn run(content: &str) -> Result<Decoded> {
        let parser = CaptureParser::new(ParserConfig::default());
        decode(
            &parser,
            &PathBuf::from("walk.csv"),
            content.as_bytes(),
            &ParseContext::default(),
        )
    }

    #[test]
    fn test_header_is_dropped() {
        let decoded = run("x,y,z\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(decoded.captures.len(), 1);
        let device = decoded.captures[0].session.get(DEFAULT_DEVICE).unwrap();
        assert_eq!(device.device_type, DeviceType::Wristband);
        assert_eq!(
            device.sensors,
            vec![
                SensorRecord::Accelerometer { x: 1, y: 2, z: 3 },
                SensorRecord::Accelerometer { x: 4, y: 5, z: 6 },
            ]
        );
    }

    #[test]
    fn test_numeric_first_row_is_data() {
        let decoded = run("12,-5,300\n").unwrap();
        let device = decoded.captures[0].session.get(DEFAULT_DEVICE).unwrap();
        assert_eq!(
            device.sensors,
            vec![SensorRecord::Accelerometer { x: 12, y: -5, z: 300 }]
        );
    }

    #[test]
    fn test_only_three_column_rows_count() {
        let decoded = run("1,2,3\n1,2\n1,2,3,4\n 7 , 8 , 9 \n").unwrap();
        let device = decoded.captures[0].session.get(DEFAULT_DEVICE).unwrap();
        assert_eq!(device.sensors.len(), 2);
        assert_eq!(device.sensors[1], SensorRecord::Accelerometer { x: 7, y: 8, z: 9 });
    }

    #[test]
    fn test_default_window() {
        let decoded = run("1,2,3\n").unwrap();
        assert_eq!(decoded.captures[0].options.duration(), Duration::seconds(30));
        assert!(decoded.captures[0].primary_key.is_none());
        assert!(decoded.label_override.is_none());
    }

    #[test]
    fn test_empty_file_is_malformed() {
        assert!(run("").unwrap_err().is_malformed());
    }

    #[test]
    fn test_non_numeric_sample_is_malformed() {
        assert!(run("1,2,3\n4,five,6\n").unwrap_err().is_malformed());
    }
}
