//! Store error types.

use thiserror::Error;

/// Errors surfaced by a store adapter.
///
/// Handlers are expected to map these to well-formed error responses rather
/// than propagating them as fatal connection errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column mismatch for table {table}: {reason}")]
    ColumnMismatch { table: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
