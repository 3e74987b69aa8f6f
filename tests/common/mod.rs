//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use ws_bridge::bookstore;
use ws_bridge::config::BridgeConfig;
use ws_bridge::lifecycle::Shutdown;
use ws_bridge::pipeline::Invoker;
use ws_bridge::BridgeServer;

/// Bridge configuration bound to `addr` with the bookstore endpoint.
pub fn bookstore_config(addr: SocketAddr) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.listener.bind_address = addr.to_string();
    config.endpoints.push(bookstore::endpoint());
    config.timeouts.shutdown_secs = 1;
    config
}

/// Start the bridge on `config.listener.bind_address` serving `invoker`.
/// Returns the handle that stops it.
pub async fn start_bridge(config: BridgeConfig, invoker: Arc<dyn Invoker>) -> Shutdown {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let shutdown = Shutdown::new();
    let server = BridgeServer::new(config, invoker);
    let server_shutdown = shutdown.clone();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown
}

/// Start the bridge serving the bookstore resources.
pub async fn start_bookstore(addr: SocketAddr) -> Shutdown {
    start_bridge(bookstore_config(addr), Arc::new(bookstore::resources())).await
}

#[allow(dead_code)]
pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{}{}", addr, bookstore::BASE_PATH)
}
