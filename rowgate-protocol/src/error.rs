//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or message decoding.
///
/// Every variant except [`ProtocolError::HeaderTooLarge`] (an encode-time
/// rejection) is fatal to the connection that produced it, and only to that
/// connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed length prefix")]
    MalformedLength,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("header too large: {size} bytes (max 65535)")]
    HeaderTooLarge { size: usize },

    #[error("payload length mismatch: header declares {declared}, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Missing-key variant of a malformed header, with the wording shared
    /// by both ends of the protocol.
    pub fn missing_header_key(key: &str) -> Self {
        ProtocolError::MalformedHeader(format!("missing required header key \"{key}\""))
    }
}
