use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::options::CaptureOptions;

/// Device name used when a capture format carries no device information.
pub const DEFAULT_DEVICE: &str = "Boz";

// ── Timestamp flag layout ─────────────────────────────────────────────────────

pub const FLAG_FAST_RATE: u8 = 0x01;
pub const FLAG_SLEEP: u8 = 0x02;
pub const FLAG_DEBUG: u8 = 0x10;
pub const FLAG_REBOOT: u8 = 0x80;

/// Hardware that produced a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "amiigo-wristband")]
    Wristband,
    #[serde(rename = "amiigo-shoepod")]
    Shoepod,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl DeviceType {
    /// Canonical engine-facing type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wristband => "amiigo-wristband",
            Self::Shoepod => "amiigo-shoepod",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a `type` string as found in capture envelopes.
    ///
    /// Accepts the canonical `amiigo-*` names as well as the bare suffixes,
    /// case-insensitively.
    pub fn from_type_str(s: &str) -> Self {
        Self::infer_from_name(s)
    }

    /// Infer the device type from a name ending in `wristband` or `shoepod`.
    pub fn infer_from_name(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        if lower.ends_with("shoepod") {
            Self::Shoepod
        } else if lower.ends_with("wristband") {
            Self::Wristband
        } else {
            Self::Unknown
        }
    }

    /// Device type for the numeric keys of the legacy `devices` object.
    pub fn from_legacy_index(index: &str) -> Option<Self> {
        match index {
            "0" => Some(Self::Wristband),
            "1" => Some(Self::Shoepod),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Sensor records ────────────────────────────────────────────────────────────

/// A timestamp marker emitted by the device, with its flag byte unpacked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Device clock in 1/128 s ticks.
    pub ticks: u32,
    /// Raw flag byte.
    pub flags: u8,
    /// Device clock in seconds.
    pub seconds: f64,
    pub reboot: bool,
    pub debug: bool,
    pub fast_rate: bool,
    pub sleep: bool,
    pub passive: bool,
    /// Firmware error word; see [`Timestamp::error_code`].
    pub errcode: i64,
}

/// Decoded firmware error word carried by debug timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareError {
    pub class: u8,
    /// Two-character module code, absent when the high half-word is zero.
    pub code: Option<String>,
    pub line: u16,
}

impl Timestamp {
    /// Timestamp with every flag boolean derived from `flags`.
    pub fn from_flags(ticks: u32, flags: u8, seconds: f64, errcode: i64) -> Self {
        Self {
            ticks,
            flags,
            seconds,
            reboot: flags & FLAG_REBOOT != 0,
            debug: flags & FLAG_DEBUG != 0,
            fast_rate: flags & FLAG_FAST_RATE != 0,
            sleep: flags & FLAG_SLEEP != 0,
            passive: false,
            errcode,
        }
    }

    /// Decode the firmware error word into class, module code and line.
    pub fn error_code(&self) -> FirmwareError {
        let word = self.errcode as u32;
        let line = (word & 0x0000_0FFF) as u16;
        let class = ((word & 0x0000_F000) >> 12) as u8;
        let module = (word & 0xFFFF_0000) >> 16;
        let code = (module != 0).then(|| {
            let hi = ((module & 0xFF00) >> 8) as u8;
            let lo = (module & 0x00FF) as u8;
            [hi as char, lo as char].iter().collect()
        });
        FirmwareError { class, code, line }
    }
}

/// One normalized sample or event, independent of the file format it came
/// from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name")]
pub enum SensorRecord {
    #[serde(rename = "accelerometer")]
    Accelerometer { x: i16, y: i16, z: i16 },
    #[serde(rename = "temperature")]
    Temperature { celsius: f64 },
    #[serde(rename = "timestamp")]
    Timestamp(Timestamp),
    #[serde(rename = "lightsensor")]
    LightSensor { ir: i64, red: i64, off: i64 },
    #[serde(rename = "lightsensor_config")]
    LightSensorConfig {
        dac_on: i64,
        gain: i64,
        level_led: i64,
        log_size: i64,
        flags: i64,
        manual: bool,
        worn: bool,
    },
    #[serde(rename = "log_count")]
    LogCount {
        log_timestamp: u32,
        log_accel_count: u16,
        old_timestamp: u32,
        timestamp: u32,
    },
    #[serde(rename = "event")]
    Event { flags: u8 },
    #[serde(rename = "unknown")]
    Unknown { kind: String, raw: serde_json::Value },
}

impl SensorRecord {
    /// Engine-facing kind name.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Accelerometer { .. } => "accelerometer",
            Self::Temperature { .. } => "temperature",
            Self::Timestamp(_) => "timestamp",
            Self::LightSensor { .. } => "lightsensor",
            Self::LightSensorConfig { .. } => "lightsensor_config",
            Self::LogCount { .. } => "log_count",
            Self::Event { .. } => "event",
            Self::Unknown { kind, .. } => kind.as_str(),
        }
    }

    pub fn is_accelerometer(&self) -> bool {
        matches!(self, Self::Accelerometer { .. })
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }
}

/// Compact `kind,[values]` form used in engine logs.
impl fmt::Display for SensorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},", self.kind_name())?;
        match self {
            Self::Accelerometer { x, y, z } => write!(f, "[{},{},{}]", x, y, z),
            Self::Temperature { celsius } => write!(f, "[{}]", celsius),
            Self::Timestamp(ts) => write!(f, "[{}, {}]", ts.ticks, ts.flags),
            Self::LightSensor { ir, red, off } => write!(f, "[{},{},{}]", ir, off, red),
            Self::LightSensorConfig {
                dac_on,
                gain,
                level_led,
                log_size,
                ..
            } => write!(f, "[{}, {}, {}, {}]", dac_on, gain, level_led, log_size),
            Self::LogCount {
                log_timestamp,
                log_accel_count,
                old_timestamp,
                timestamp,
            } => write!(
                f,
                "[{}, {}, {}, {}]",
                log_timestamp, log_accel_count, old_timestamp, timestamp
            ),
            Self::Event { flags } => write!(f, "[{}]", flags),
            Self::Unknown { raw, .. } => write!(f, "[{}]", raw),
        }
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// The ordered sensor stream of one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapture {
    pub sensors: Vec<SensorRecord>,
    #[serde(rename = "type", default)]
    pub device_type: DeviceType,
}

impl DeviceCapture {
    pub fn new(sensors: Vec<SensorRecord>, device_type: DeviceType) -> Self {
        Self {
            sensors,
            device_type,
        }
    }

    /// Number of accelerometer samples in the stream.
    pub fn accelerometer_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_accelerometer()).count()
    }
}

/// Device name → sensor stream, in insertion order.
///
/// Serialized as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    devices: Vec<(String, DeviceCapture)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session holding a single device.
    pub fn single(name: impl Into<String>, capture: DeviceCapture) -> Self {
        let mut session = Self::new();
        session.insert(name, capture);
        session
    }

    /// Insert a device; an existing device of the same name is replaced in
    /// place so the insertion order survives.
    pub fn insert(&mut self, name: impl Into<String>, capture: DeviceCapture) {
        let name = name.into();
        match self.devices.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = capture,
            None => self.devices.push((name, capture)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DeviceCapture> {
        self.devices
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, capture)| capture)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeviceCapture)> {
        self.devices.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn device_names(&self) -> Vec<&str> {
        self.devices.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Total number of sensor records across all devices.
    pub fn record_count(&self) -> usize {
        self.devices.iter().map(|(_, c)| c.sensors.len()).sum()
    }
}

impl Serialize for Session {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.devices.len()))?;
        for (name, capture) in &self.devices {
            map.serialize_entry(name, capture)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Session {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SessionVisitor;

        impl<'de> Visitor<'de> for SessionVisitor {
            type Value = Session;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of device name to device capture")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Session, A::Error> {
                let mut session = Session::new();
                while let Some((name, capture)) = access.next_entry::<String, DeviceCapture>()? {
                    session.insert(name, capture);
                }
                Ok(session)
            }
        }

        deserializer.deserialize_map(SessionVisitor)
    }
}

/// One parsed recording: its devices, capture window and optional primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub session: Session,
    pub options: CaptureOptions,
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl Capture {
    pub fn new(session: Session, options: CaptureOptions) -> Self {
        Self {
            session,
            options,
            primary_key: None,
        }
    }
}

/// Everything a single top-level `parse` call produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOutcome {
    /// Captures in file / archive / manifest order.
    pub captures: Vec<Capture>,
    /// Canonical capture label.
    pub label: String,
    /// The path exactly as passed to the parser.
    pub path: PathBuf,
    /// Lowercased file stem.
    pub name: String,
}

impl ParseOutcome {
    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}
