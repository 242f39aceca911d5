//! The self-describing message header.
//!
//! Every TAP message begins with a 2-byte length prefix followed by a JSON
//! header object carrying exactly four required keys: `byteorder`,
//! `content-type`, `content-encoding`, `content-length`. A decoder ignores
//! any extra keys; a missing required key is fatal for the connection.

use crate::error::ProtocolError;
use serde::Serialize;
use serde_json::{Map, Value};

/// The four keys every header must carry.
pub const REQUIRED_KEYS: [&str; 4] = [
    "byteorder",
    "content-type",
    "content-encoding",
    "content-length",
];

/// Decoded message header.
///
/// `byteorder` is a cross-implementation diagnostics tag ("little" or
/// "big", the encoder's native order); it is never used to reinterpret
/// payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub byteorder: String,
    #[serde(rename = "content-type")]
    pub content_type: String,
    #[serde(rename = "content-encoding")]
    pub content_encoding: String,
    #[serde(rename = "content-length")]
    pub content_length: usize,
}

impl Header {
    /// Creates a header tagged with the native byte order.
    pub fn new(
        content_type: impl Into<String>,
        content_encoding: impl Into<String>,
        content_length: usize,
    ) -> Self {
        Self {
            byteorder: native_byteorder().to_string(),
            content_type: content_type.into(),
            content_encoding: content_encoding.into(),
            content_length,
        }
    }

    /// Serializes the header as UTF-8 JSON.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a header from its UTF-8 JSON bytes.
    ///
    /// Fails with `MalformedHeader` if the bytes are not valid JSON, not an
    /// object, or any required key is absent or of the wrong type. Extra
    /// keys are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedHeader(e.to_string()))?;
        let map = value
            .as_object()
            .ok_or_else(|| ProtocolError::MalformedHeader("header is not a JSON object".into()))?;

        let byteorder = string_key(map, "byteorder")?;
        let content_type = string_key(map, "content-type")?;
        let content_encoding = string_key(map, "content-encoding")?;
        let content_length = map
            .get("content-length")
            .ok_or_else(|| ProtocolError::missing_header_key("content-length"))?
            .as_u64()
            .ok_or_else(|| {
                ProtocolError::MalformedHeader("content-length is not an unsigned integer".into())
            })? as usize;

        Ok(Self {
            byteorder,
            content_type,
            content_encoding,
            content_length,
        })
    }
}

fn string_key(map: &Map<String, Value>, key: &'static str) -> Result<String, ProtocolError> {
    map.get(key)
        .ok_or_else(|| ProtocolError::missing_header_key(key))?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::MalformedHeader(format!("{key} is not a string")))
}

/// Byte order tag of this build, for the `byteorder` header key.
pub fn native_byteorder() -> &'static str {
    if cfg!(target_endian = "big") {
        "big"
    } else {
        "little"
    }
}
