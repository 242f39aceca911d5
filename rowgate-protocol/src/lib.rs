//! # rowgate-protocol
//!
//! Wire protocol implementation for rowgate (TAP - Table Access Protocol).
//!
//! This crate provides:
//! - Length-prefixed framing with a self-describing JSON header
//! - Message model for structured-text and raw-binary payloads
//! - Request/Response application envelopes
//! - Protocol error types and constants
//!
//! Everything here is a pure transformation over byte slices; there is no
//! I/O and no connection state. Both peers (initiator and acceptor) share
//! this crate.

pub mod error;
pub mod frame;
pub mod header;
pub mod message;

pub use error::ProtocolError;
pub use frame::{frame, LENGTH_PREFIX_SIZE, MAX_HEADER_SIZE};
pub use header::{native_byteorder, Header};
pub use message::{
    decode_body, Message, Payload, Request, Response, BINARY_CLIENT_TYPE, BINARY_ENCODING,
    BINARY_SERVER_TYPE, TEXT_JSON, UTF_8,
};

/// Default port for the rowgate server.
pub const DEFAULT_PORT: u16 = 8321;
