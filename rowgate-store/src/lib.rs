//! # rowgate-store
//!
//! Store adapter consumed by request handlers.
//!
//! The core treats the backing store as an opaque external collaborator:
//! handlers see only the [`Store`] trait. Schema management, query
//! construction, pooling, and transactions are deliberately out of scope.
//! [`MemStore`] is the bundled in-memory implementation used by the server
//! binary and tests.

pub mod error;
pub mod mem;

pub use error::StoreError;
pub use mem::MemStore;

use serde_json::Value;

/// Capability handlers use to read and write persisted rows.
///
/// Implementations must be safe for concurrent use; the dispatcher invokes
/// handlers without any synchronization of its own.
pub trait Store: Send + Sync {
    /// Returns every row of `table`, values in column order.
    fn read_all(&self, table: &str) -> Result<Vec<Vec<Value>>, StoreError>;

    /// Inserts one row into `table`, matching `values` to `columns`
    /// positionally. Columns the table has but `columns` omits are null.
    fn insert(&self, table: &str, columns: &[String], values: &[Value]) -> Result<(), StoreError>;
}
