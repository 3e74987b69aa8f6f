//! WebSocket bridge ingress.
//!
//! # Responsibilities
//! - Complete the upgrade on an endpoint base path
//! - Refuse the upgrade with 503 when the connection cap is reached
//! - Run one writer task per connection fed by a bounded queue
//! - Feed inbound Text/Binary messages to an `ExchangeSession`
//!
//! # Data Flow
//! ```text
//! Client ──── messages ───→ ExchangeSession ──→ Invoker
//! Client ←─── frames ────── writer task ←────── FrameWriter (bounded)
//! ```
//!
//! # Design Decisions
//! - Outbound frames are always binary messages
//! - Ping/pong is answered by the transport
//! - A Close message or a transport error ends the session

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{future, SinkExt, StreamExt};
use tracing::Instrument;

use crate::bridge::encoder::FrameWriter;
use crate::bridge::request::InboundMessage;
use crate::bridge::scope::ScopeValidator;
use crate::bridge::session::ExchangeSession;
use crate::config::EndpointConfig;
use crate::http::server::AppState;
use crate::net::connection::ConnectionGuard;

/// Accept a bridge connection on `endpoint`.
pub fn upgrade(ws: WebSocketUpgrade, state: AppState, endpoint: EndpointConfig) -> Response {
    let Some(guard) = state.connections.try_track(&endpoint.base_path) else {
        tracing::warn!(
            endpoint = %endpoint.name,
            max_connections = state.connections.max_connections(),
            "Bridge connection refused: limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "bridge connection limit reached").into_response();
    };

    ws.on_failed_upgrade(|error| {
        tracing::warn!(error = %error, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| {
        let span = tracing::info_span!(
            "bridge",
            connection_id = %guard.id(),
            endpoint = %endpoint.name
        );
        serve_connection(socket, state, endpoint, guard).instrument(span)
    })
}

async fn serve_connection(
    socket: WebSocket,
    state: AppState,
    endpoint: EndpointConfig,
    guard: ConnectionGuard,
) {
    tracing::info!(base_path = %endpoint.base_path, "Bridge connection opened");

    let (mut sink, stream) = socket.split();
    let (writer, mut frames) = FrameWriter::channel(state.config.session.outbound_queue);

    let writer_task = tokio::spawn(
        async move {
            while let Some(frame) = frames.recv().await {
                if let Err(e) = sink.send(Message::Binary(frame)).await {
                    tracing::debug!(error = %e, "Bridge socket write failed");
                    return;
                }
            }
            let _ = sink.close().await;
        }
        .in_current_span(),
    );

    let inbound = stream
        .take_while(|message| {
            future::ready(match message {
                Ok(Message::Close(_)) => false,
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "Bridge socket read failed");
                    false
                }
            })
        })
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Binary(bytes)) => Some(InboundMessage::Binary(bytes)),
                Ok(Message::Text(text)) => Some(InboundMessage::Text(text.as_str().to_owned())),
                _ => None,
            })
        });

    let session = ExchangeSession::new(
        guard.id(),
        ScopeValidator::new(&endpoint.base_path),
        state.invoker.clone(),
        writer,
        state.config.session.clone(),
    )
    .with_cancellation(state.sessions.child_token())
    .with_guard(guard);

    let summary = session.run(Box::pin(inbound)).await;

    // The session owned the last writer handle; the task flushes and closes.
    if let Err(e) = writer_task.await {
        tracing::warn!(error = %e, "Bridge writer task failed");
    }

    tracing::info!(
        exchanges = summary.exchanges,
        cancelled_in_flight = summary.cancelled_in_flight,
        dropped_requests = summary.dropped_requests,
        "Bridge connection closed"
    );
}
