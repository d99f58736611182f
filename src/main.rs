//! burrow - remote read-only key-value database server.
//!
//! Serves the embedded store over TCP, one session per connection.

use burrow_server::{Config, Server};
use burrow_store::Store;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if BURROW_CONFIG is set, then env
    // overrides).
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("BURROW_CONFIG") {
                tracing::info!("loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // A config file was explicitly specified; fail on error.
            tracing::error!("failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("starting burrow server");
    tracing::info!("  bind address: {}", config.bind_addr);
    tracing::info!("  max connections: {}", config.max_connections);

    // The store starts empty; the embedding application populates it
    // through the burrow-store API before or while serving.
    let store = Arc::new(Store::new());

    let server = Arc::new(Server::new(config, store));
    let run_server = server.clone();
    let run = tokio::spawn(async move { run_server.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received");
    // Stop accepting; sessions already running drain on their own streams.
    server.shutdown();

    run.await??;
    Ok(())
}
