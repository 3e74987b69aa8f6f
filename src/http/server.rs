//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with one dispatch handler
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Send WebSocket upgrades on an endpoint base path to the bridge,
//!   everything else to the plain HTTP ingress
//! - Serve the admin API on its own listener when enabled
//! - Cancel live sessions and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ws::rejection::WebSocketUpgradeRejection, State, WebSocketUpgrade},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::BridgeConfig;
use crate::http::{ingress, websocket};
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::pipeline::Invoker;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub invoker: Arc<dyn Invoker>,
    pub connections: ConnectionTracker,
    /// Parent of every session's cancellation token.
    pub sessions: CancellationToken,
}

/// HTTP server hosting the bridge and plain HTTP ingresses.
pub struct BridgeServer {
    router: Router,
    state: AppState,
}

impl BridgeServer {
    /// Create a new server dispatching requests to `invoker`.
    pub fn new(config: BridgeConfig, invoker: Arc<dyn Invoker>) -> Self {
        let connections = ConnectionTracker::new(config.listener.max_connections);
        let state = AppState {
            config: Arc::new(config),
            invoker,
            connections,
            sessions: CancellationToken::new(),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);
        let body_limit = state.config.session.max_message_bytes;

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn connections(&self) -> ConnectionTracker {
        self.state.connections.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.state.config
    }

    /// Run the server until `shutdown` triggers.
    ///
    /// On shutdown the listener stops accepting, every live session is
    /// cancelled, and open connections get `timeouts.shutdown_secs` to drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.state.config.endpoints.len(),
            "Bridge server starting"
        );

        let admin = &self.state.config.admin;
        if admin.enabled {
            let admin_listener = TcpListener::bind(&admin.bind_address).await?;
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
            let admin_router = setup_admin_router(self.state.connections.clone());
            let admin_shutdown = shutdown.clone();
            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(async move { admin_shutdown.wait().await })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API stopped");
                }
            });
        }

        let sessions = self.state.sessions.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                sessions.cancel();
            })
            .await?;

        let grace = Duration::from_secs(self.state.config.timeouts.shutdown_secs);
        if !self.state.connections.wait_for_drain(grace).await {
            tracing::warn!(
                remaining = self.state.connections.active_count(),
                "Bridge connections still open after shutdown grace period"
            );
        }

        tracing::info!("Bridge server stopped");
        Ok(())
    }
}

/// Single entry point for every request.
async fn dispatch(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request<Body>,
) -> Response {
    if let Ok(upgrade) = upgrade {
        if let Some(endpoint) = state.config.endpoint_for(request.uri().path()) {
            let endpoint = endpoint.clone();
            return websocket::upgrade(upgrade, state, endpoint);
        }
    }
    ingress::handle(state, request).await
}
