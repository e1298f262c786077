//! Human and machine readable output for parse results.

use std::io::Write;

use capture_core::models::{Capture, ParseOutcome};
use chrono::SecondsFormat;

/// One line per capture:
/// `label  path#index  device[type]=records,...  start .. end (Ns)`.
pub fn write_summary<W: Write>(out: &mut W, outcomes: &[ParseOutcome]) -> std::io::Result<()> {
    let mut total = 0usize;
    let mut records = 0usize;
    for outcome in outcomes {
        for (index, capture) in outcome.captures.iter().enumerate() {
            writeln!(
                out,
                "{}\t{}#{}\t{}\t{}",
                outcome.label,
                outcome.path.display(),
                index,
                devices_column(capture),
                window_column(capture)
            )?;
            total += 1;
            records += capture.session.record_count();
        }
    }
    writeln!(
        out,
        "{} captures ({} records) from {} files",
        total,
        records,
        outcomes.len()
    )
}

pub fn write_json<W: Write>(out: &mut W, outcomes: &[ParseOutcome]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, outcomes)?;
    writeln!(out)?;
    Ok(())
}

fn devices_column(capture: &Capture) -> String {
    if capture.session.is_empty() {
        return "-".to_string();
    }
    capture
        .session
        .iter()
        .map(|(name, device)| format!("{}[{}]={}", name, device.device_type, device.sensors.len()))
        .collect::<Vec<_>>()
        .join(",")
}

fn window_column(capture: &Capture) -> String {
    let options = &capture.options;
    let secs = options.duration().num_milliseconds() as f64 / 1000.0;
    format!(
        "{} .. {} ({}s)",
        options.start_timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        options.end_timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        secs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_core::models::{DeviceCapture, DeviceType, SensorRecord, Session};
    use capture_core::options::{capture_epoch, CaptureOptions};
    use chrono::Duration;
    use std::path::PathBuf;

    fn outcome() -> ParseOutcome {
        let session = Session::single(
            "Boz",
            DeviceCapture::new(
                vec![SensorRecord::Accelerometer { x: 1, y: 2, z: 3 }],
                DeviceType::Wristband,
            ),
        );
        let options = CaptureOptions::resolve(capture_epoch(), Duration::seconds(30));
        ParseOutcome {
            captures: vec![Capture::new(session, options)],
            label: "walk".to_string(),
            path: PathBuf::from("walk_REF.csv"),
            name: "walk_ref".to_string(),
        }
    }

    #[test]
    fn test_summary_line() {
        let mut buf = Vec::new();
        write_summary(&mut buf, &[outcome()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "walk\twalk_REF.csv#0\tBoz[amiigo-wristband]=1\t\
             1981-06-12T04:25:21.565Z .. 1981-06-12T04:25:51.565Z (30s)"
        );
        assert_eq!(lines.next().unwrap(), "1 captures (1 records) from 1 files");
    }

    #[test]
    fn test_json_output_keeps_device_order() {
        let mut buf = Vec::new();
        write_json(&mut buf, &[outcome()]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value[0]["label"], "walk");
        let device = &value[0]["captures"][0]["session"]["Boz"];
        assert_eq!(device["type"], "amiigo-wristband");
        assert_eq!(device["sensors"][0]["name"], "accelerometer");
    }
}
