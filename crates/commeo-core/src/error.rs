//! Error types for Commeo frames

use thiserror::Error;

use crate::frame::FieldKind;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Commeo codec error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Frame is not a method call or method response
    #[error("unrecognized frame format: {0}")]
    Format(String),

    /// Gateway answered with a fault envelope
    #[error("gateway fault: {}", .0.join("; "))]
    Fault(Vec<String>),

    /// No field of the requested type at this index
    #[error("missing {kind} field at index {index}")]
    MissingField { kind: FieldKind, index: usize },

    /// Field present but its text does not parse as the requested type
    #[error("invalid {kind} field at index {index}: {value:?}")]
    InvalidField {
        kind: FieldKind,
        index: usize,
        value: String,
    },

    /// Base64 payload could not be decoded
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// Drive position outside 0..=100
    #[error("position out of range: {0} (max 100)")]
    InvalidPosition(u8),
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::InvalidBase64(e.to_string())
    }
}

impl Error {
    /// True if the gateway reported a fault rather than the frame being malformed
    pub fn is_fault(&self) -> bool {
        matches!(self, Error::Fault(_))
    }
}
