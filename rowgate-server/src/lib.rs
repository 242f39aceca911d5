//! # rowgate-server
//!
//! Readiness-driven TCP server for rowgate.
//!
//! This crate provides:
//! - A single-threaded reactor multiplexing all connections over `mio`
//! - The per-connection incremental protocol parser state machine
//! - Request dispatch by action name to registered handlers
//! - Built-in `read_table` / `insert` handlers over the store adapter
//!
//! The reactor is an explicitly constructed, explicitly owned object; there
//! is no process-wide selector state. Every connection performs exactly one
//! request/response exchange and then closes.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod reactor;

pub use config::{Config, NetworkConfig, StoreConfig, TableConfig};
pub use connection::{ConnState, Connection, ReadProgress, WriteProgress};
pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use reactor::{Reactor, ShutdownHandle};
