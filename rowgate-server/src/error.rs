//! Server error types.

use thiserror::Error;

/// Server errors.
///
/// All of these are contained at per-connection granularity inside the
/// reactor's event-processing step; none terminates the run loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] rowgate_protocol::ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] rowgate_store::StoreError),
}
