//! rowgate-cli - Command-line client for rowgate
//!
//! One-shot commands against a running server, one connection per command.

use clap::{Parser, Subcommand};
use colored::Colorize;
use rowgate_client::Client;
use rowgate_protocol::Payload;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowgate-cli")]
#[command(about = "Command-line client for the rowgate table-access gateway")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8321", env = "ROWGATE_SERVER")]
    server: SocketAddr,

    /// Request timeout in seconds
    #[arg(long, default_value = "5")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read every row of a table
    ReadTable {
        /// Table name
        table: String,
    },

    /// Insert one row
    Insert {
        /// Table name
        #[arg(short, long)]
        table: String,

        /// Column names, comma-separated
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Row values as a JSON array, e.g. '["Corp", 12345, [12345]]'
        values: String,
    },

    /// Send an arbitrary action with a JSON value
    Call {
        /// Action name
        action: String,

        /// JSON value (defaults to null)
        value: Option<String>,
    },

    /// Send raw bytes and print the server's binary echo
    BinaryEcho {
        /// Bytes to send, taken as UTF-8 text
        data: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let client = Client::new(cli.server).with_timeout(Duration::from_secs(cli.timeout));

    match cli.command {
        Commands::ReadTable { table } => {
            let response = client.read_table(&table)?;
            print_result(&response.result);
        }
        Commands::Insert {
            table,
            columns,
            values,
        } => {
            let values: Value = serde_json::from_str(&values)?;
            let response = client.call(
                "insert",
                serde_json::json!({
                    "table": table,
                    "columns": columns,
                    "values": values,
                }),
            )?;
            print_result(&response.result);
        }
        Commands::Call { action, value } => {
            let value = match value {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Value::Null,
            };
            let response = client.call(&action, value)?;
            print_result(&response.result);
        }
        Commands::BinaryEcho { data } => {
            let reply = client.send_binary(data.as_bytes())?;
            match reply.payload {
                Payload::Binary(bytes) => {
                    println!("{}", String::from_utf8_lossy(&bytes));
                }
                Payload::Json(value) => print_result(&value),
            }
        }
    }

    Ok(())
}

fn print_result(result: &Value) {
    match result {
        Value::String(s) if s.starts_with("Error:") => {
            eprintln!("{}", s.as_str().red());
            std::process::exit(1);
        }
        _ => match serde_json::to_string_pretty(result) {
            Ok(pretty) => println!("{}", pretty.as_str().green()),
            Err(_) => println!("{result}"),
        },
    }
}
