//! Message model and application-level envelopes.

use crate::error::ProtocolError;
use crate::frame::frame;
use crate::header::{native_byteorder, Header};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content type for structured-text payloads.
pub const TEXT_JSON: &str = "text/json";

/// Content encoding for structured-text payloads. The only text encoding
/// this implementation supports.
pub const UTF_8: &str = "utf-8";

/// Content encoding tag for raw-binary payloads.
pub const BINARY_ENCODING: &str = "binary";

/// Content type used by the client for raw-binary requests.
pub const BINARY_CLIENT_TYPE: &str = "binary/custom-client-binary-type";

/// Content type used by the server for raw-binary responses.
pub const BINARY_SERVER_TYPE: &str = "binary/custom-server-binary-type";

/// A decoded message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured value, decoded from a `text/json` body.
    Json(Value),
    /// Raw bytes, passed through unchanged for any other content type.
    Binary(Bytes),
}

/// A logical unit exchanged over the wire, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub content_type: String,
    pub content_encoding: String,
    /// Diagnostics tag carried in the header; not used for decoding.
    pub byte_order: String,
    pub payload: Payload,
}

impl Message {
    /// Creates a structured-text message.
    pub fn json(value: Value) -> Self {
        Self {
            content_type: TEXT_JSON.to_string(),
            content_encoding: UTF_8.to_string(),
            byte_order: native_byteorder().to_string(),
            payload: Payload::Json(value),
        }
    }

    /// Creates a raw-binary message.
    pub fn binary(content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            content_type: content_type.into(),
            content_encoding: BINARY_ENCODING.to_string(),
            byte_order: native_byteorder().to_string(),
            payload: Payload::Binary(bytes),
        }
    }

    /// Serializes the payload into its wire bytes.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        match &self.payload {
            Payload::Json(value) => Ok(serde_json::to_vec(value)?),
            Payload::Binary(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// Produces the complete framed wire bytes for this message.
    pub fn to_frame(&self) -> Result<BytesMut, ProtocolError> {
        let payload = self.payload_bytes()?;
        let mut header = Header::new(&self.content_type, &self.content_encoding, payload.len());
        header.byteorder = self.byte_order.clone();
        frame(&header, &payload)
    }

    /// Reassembles a message from a decoded header and its exact body bytes.
    pub fn from_parts(header: &Header, body: &[u8]) -> Result<Self, ProtocolError> {
        let payload = decode_body(body, header)?;
        Ok(Self {
            content_type: header.content_type.clone(),
            content_encoding: header.content_encoding.clone(),
            byte_order: header.byteorder.clone(),
            payload,
        })
    }
}

/// Decodes a message body according to its header.
///
/// `text/json` bodies are parsed as JSON using the declared
/// `content-encoding` (only UTF-8 is supported); every other content type
/// passes through as raw bytes. The body must match the declared
/// `content-length` exactly — no padding, no truncation.
pub fn decode_body(body: &[u8], header: &Header) -> Result<Payload, ProtocolError> {
    if body.len() != header.content_length {
        return Err(ProtocolError::LengthMismatch {
            declared: header.content_length,
            actual: body.len(),
        });
    }

    if header.content_type == TEXT_JSON {
        if !header.content_encoding.eq_ignore_ascii_case(UTF_8) {
            return Err(ProtocolError::UnsupportedEncoding(
                header.content_encoding.clone(),
            ));
        }
        let text = std::str::from_utf8(body).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(Payload::Json(serde_json::from_str(text)?))
    } else {
        Ok(Payload::Binary(Bytes::copy_from_slice(body)))
    }
}

/// Application-level request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: String,
    #[serde(default)]
    pub value: Value,
}

impl Request {
    pub fn new(action: impl Into<String>, value: Value) -> Self {
        Self {
            action: action.into(),
            value,
        }
    }
}

/// Application-level response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub result: Value,
}

impl Response {
    pub fn new(result: Value) -> Self {
        Self { result }
    }

    /// Well-formed error response for an unrecognized action name.
    pub fn invalid_action(action: &str) -> Self {
        Self {
            result: Value::String(format!("Error: invalid action {action}")),
        }
    }
}
