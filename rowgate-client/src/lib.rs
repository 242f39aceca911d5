//! # rowgate-client
//!
//! Blocking client for the rowgate wire protocol. One connection per
//! request/response exchange, matching the server's connection lifecycle.
//!
//! ```no_run
//! use rowgate_client::Client;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("127.0.0.1:8321".parse()?);
//! let response = client.read_table("organization")?;
//! println!("{}", response.result);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{read_message, Client};
pub use error::ClientError;
