//! rowgate - Table-Access Gateway
//!
//! A TCP gateway exposing table reads and inserts over a length-prefixed,
//! JSON-headed wire protocol, served by a single-threaded readiness reactor.

use rowgate_server::handlers::register_builtin;
use rowgate_server::{Config, Dispatcher, Reactor};
use rowgate_store::{MemStore, Store};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if ROWGATE_CONFIG is set, then env
    // overrides); load only fails when a file was explicitly specified
    let config = match Config::load() {
        Ok(c) => {
            match std::env::var("ROWGATE_CONFIG") {
                Ok(path) => tracing::info!("Loaded config from {}", path),
                Err(_) => tracing::info!("Using default configuration"),
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting rowgate server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max connections: {}", config.network.max_connections);
    match config.network.idle_timeout() {
        Some(timeout) => tracing::info!("  Idle timeout: {:?}", timeout),
        None => tracing::info!("  Idle timeout: disabled"),
    }

    // Create the store and its configured tables
    let store = MemStore::new();
    for table in &config.store.tables {
        tracing::info!("  Table: {} ({})", table.name, table.columns.join(", "));
        store.create_table(&table.name, &table.columns);
    }

    if config.store.seed_demo {
        seed_demo(&store)?;
    }

    // Register the built-in actions
    let mut dispatcher = Dispatcher::new();
    register_builtin(&mut dispatcher, Arc::new(store));

    // Run the reactor (blocks until shutdown)
    let mut reactor = Reactor::bind(config.network, dispatcher)?;
    reactor.run()?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Seeds the demo organization row so a fresh server answers `read_table`
/// with something visible.
fn seed_demo(store: &MemStore) -> Result<(), Box<dyn std::error::Error>> {
    store.insert(
        "organization",
        &[
            "name".to_string(),
            "uni_code".to_string(),
            "department_uni_codes".to_string(),
        ],
        &[
            serde_json::json!("Corp"),
            serde_json::json!(12345),
            serde_json::json!([12345]),
        ],
    )?;
    tracing::info!("  Seeded demo organization row");
    Ok(())
}
