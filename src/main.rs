//! WebSocket bridge server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────────────┐
//!                     │                     WS BRIDGE                          │
//!                     │                                                        │
//!   WebSocket client  │  ┌─────────┐   ┌──────────┐   ┌───────┐   ┌─────────┐ │
//!   ──── messages ────┼─▶│  http   │──▶│  bridge  │──▶│ scope │──▶│pipeline │ │
//!                     │  │websocket│   │ decoder  │   │ check │   │ invoker │ │
//!                     │  └─────────┘   └──────────┘   └───────┘   └────┬────┘ │
//!                     │                                                │      │
//!   ◀──── frames ─────┼──── writer task ◀──── frame encoder ◀──────────┘      │
//!                     │                                                        │
//!   HTTP client       │  ┌─────────┐                              ┌─────────┐ │
//!   ─── requests ─────┼─▶│  http   │─────────────────────────────▶│pipeline │ │
//!   ◀── responses ────┼──│ ingress │◀─────────────────────────────│ invoker │ │
//!                     │  └─────────┘                              └─────────┘ │
//!                     │                                                        │
//!                     │  config · observability · lifecycle · admin            │
//!                     └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use ws_bridge::bookstore;
use ws_bridge::config::{load_config, validation::validate_config, BridgeConfig, ConfigError};
use ws_bridge::lifecycle::{signals, Shutdown};
use ws_bridge::observability::{logging, metrics};
use ws_bridge::BridgeServer;

#[derive(Parser)]
#[command(name = "ws-bridge")]
#[command(about = "HTTP-shaped exchanges over WebSocket connections", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults serve the bookstore demo
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig {
            endpoints: vec![bookstore::endpoint()],
            ..BridgeConfig::default()
        },
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ws-bridge starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        endpoints = ?config.endpoints.iter().map(|e| e.base_path.as_str()).collect::<Vec<_>>(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = BridgeServer::new(config, Arc::new(bookstore::resources()));
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
