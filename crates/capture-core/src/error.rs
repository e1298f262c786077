use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while parsing capture files.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A capture file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not map to any known capture format.
    #[error("Unknown file type: {0}")]
    UnknownFormat(String),

    /// The content violates the schema of the format it claims to be.
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    /// A JSON document (or pseudo-JSON payload) could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSV capture could not be read.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A ZIP container could not be opened or one of its entries read.
    #[error("Failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The caller asked for the scan to stop.
    #[error("Parsing cancelled")]
    Cancelled,

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ParseError {
    /// Shorthand for [`ParseError::MalformedContent`].
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedContent(msg.into())
    }

    /// `true` for every failure caused by the bytes of a file rather than by
    /// its absence, its extension or the caller.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedContent(_) | Self::Json(_) | Self::Csv(_) | Self::Archive(_)
        )
    }
}

/// Convenience alias used throughout the capture crates.
pub type Result<T> = std::result::Result<T, ParseError>;
