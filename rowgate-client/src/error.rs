//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] rowgate_protocol::ProtocolError),

    /// The server closed the connection before a complete response arrived.
    #[error("connection closed before a response arrived")]
    NoResponse,

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}
