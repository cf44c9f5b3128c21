//! Error types for the Kiln protocol codec.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding requests or framing the byte stream.
#[derive(Error, Debug)]
pub enum Error {
    /// A read ran past the end of the supplied buffer
    #[error("out of bounds reading {field}: needed {needed} bytes, {remaining} remaining")]
    OutOfBounds {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// No decoder/encoder is registered for this API key and version
    #[error("unsupported version {api_version} for API key {api_key}")]
    UnsupportedVersion { api_key: i16, api_version: i16 },

    /// A field violated its own wire invariant
    #[error("malformed field {field}: {reason}")]
    MalformedField { field: &'static str, reason: String },

    /// Transport framing violations (size prefix out of range)
    #[error("Frame error: {0}")]
    Frame(String),

    /// I/O errors surfaced through the frame codec
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedField {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the field that failed to decode, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Error::OutOfBounds { field, .. } | Error::MalformedField { field, .. } => Some(field),
            _ => None,
        }
    }
}
