use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the meter analyzer.
///
/// "Not enough readings" and "no appliances" are not errors: they are
/// variants of the report types so callers can render an empty state.
#[derive(Error, Debug)]
pub enum MeterError {
    /// An input field was negative, not a finite number, or otherwise
    /// unacceptable. Nothing has been written when this is returned.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The durable log or image store could not be read or written.
    #[error("Storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A row in a record log could not be decoded.
    #[error("Corrupt record log {path} (line {line}): {reason}")]
    CorruptLog {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A period selector is not one of day/week/month/year.
    #[error("Unknown period unit: {0}")]
    UnknownPeriod(String),

    /// A JSON document could not be parsed or produced.
    #[error("Failed to process JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MeterError {
    /// Shorthand for building a [`MeterError::Validation`].
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        MeterError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// `true` for failures of the underlying durable medium.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            MeterError::Storage { .. } | MeterError::CorruptLog { .. } | MeterError::Io(_)
        )
    }
}

/// Convenience alias used throughout the meter crates.
pub type Result<T> = std::result::Result<T, MeterError>;
