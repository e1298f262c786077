//! Core model for wearable capture ingestion.
//!
//! Defines the canonical records a live ingestion engine receives, the
//! normalizer that turns any historical payload encoding into them, the
//! label and capture-window rules, and the shared error type.

pub mod config;
pub mod error;
pub mod label;
pub mod literal;
pub mod models;
pub mod options;
pub mod sensor;

pub use config::{ParsePolicy, ParserConfig};
pub use error::{ParseError, Result};
pub use models::{Capture, DeviceCapture, DeviceType, ParseOutcome, SensorRecord, Session};
pub use options::CaptureOptions;
