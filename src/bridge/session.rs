//! Exchange session: one per bridge connection.
//!
//! # State Machine
//! ```text
//!            decode error / scope error (synthetic 400)
//!        ┌────────────────────────────────────────┐
//!        ▼                                        │
//!      Idle ──▶ Decoding ──▶ Validating ──▶ Dispatched ──┐
//!        ▲                                        │      │ events
//!        └──────────── stream ends ───────────────┘ ◀────┘
//!
//!      any state ──▶ Closed (connection gone; open exchange cancelled)
//! ```
//!
//! # Design Decisions
//! - At most one exchange is open per connection; a request arriving while
//!   one is `Dispatched` is an illegal transition and is queued instead
//! - Events are forwarded as they arrive, never buffered whole
//! - All frames go through the connection's single writer, in order
//! - Closing is a normal path: the open exchange's token is cancelled and
//!   its stream dropped; no frame is forced out

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::bridge::encoder::{ExchangeEncoder, Frame, FrameWriter};
use crate::bridge::error::{RejectError, SessionError};
use crate::bridge::request::{InboundMessage, PseudoRequest};
use crate::bridge::response::PseudoResponse;
use crate::bridge::scope::ScopeValidator;
use crate::config::SessionConfig;
use crate::net::connection::{ConnectionGuard, ConnectionId};
use crate::observability::metrics;
use crate::pipeline::{ExchangeContext, Invoker, ResponseStream};

/// Lifecycle states of a bridge connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No open exchange.
    Idle,
    /// Parsing an inbound message.
    Decoding,
    /// Checking the decoded path against the connection scope.
    Validating,
    /// Pipeline invoked; events are being forwarded.
    Dispatched,
    /// Connection gone. Terminal.
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Decoding => "decoding",
            SessionState::Validating => "validating",
            SessionState::Dispatched => "dispatched",
            SessionState::Closed => "closed",
        }
    }

    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Idle, Decoding)
                | (Decoding, Validating)
                | (Decoding, Idle)
                | (Validating, Dispatched)
                | (Validating, Idle)
                | (Dispatched, Idle)
        ) || (to == Closed && self != Closed)
    }

    /// The state after moving to `to`, or the illegal transition.
    pub fn transition(self, to: SessionState) -> Result<SessionState, SessionError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(SessionError::IllegalTransition { from: self, to })
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Exchanges started on the connection, rejected ones included.
    pub exchanges: u64,
    /// Whether an exchange was still open when the connection closed.
    pub cancelled_in_flight: bool,
    /// Requests dropped because the queue was full.
    pub dropped_requests: u64,
}

struct OpenExchange {
    number: u64,
    events: ResponseStream,
    encoder: ExchangeEncoder,
    cancel: CancellationToken,
    started: Instant,
    status: u16,
}

/// Drives the exchanges of one connection.
pub struct ExchangeSession {
    id: ConnectionId,
    scope: ScopeValidator,
    invoker: Arc<dyn Invoker>,
    writer: FrameWriter,
    config: SessionConfig,
    state: SessionState,
    queued: VecDeque<InboundMessage>,
    exchanges: u64,
    dropped: u64,
    cancel: CancellationToken,
    guard: Option<ConnectionGuard>,
}

impl ExchangeSession {
    pub fn new(
        id: ConnectionId,
        scope: ScopeValidator,
        invoker: Arc<dyn Invoker>,
        writer: FrameWriter,
        config: SessionConfig,
    ) -> Self {
        Self {
            id,
            scope,
            invoker,
            writer,
            config,
            state: SessionState::Idle,
            queued: VecDeque::new(),
            exchanges: 0,
            dropped: 0,
            cancel: CancellationToken::new(),
            guard: None,
        }
    }

    /// Close the session when `token` is cancelled (server shutdown).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report state changes to the connection registry.
    pub fn with_guard(mut self, guard: ConnectionGuard) -> Self {
        self.id = guard.id();
        self.guard = Some(guard);
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Process inbound messages until the connection closes.
    pub async fn run<S>(mut self, mut inbound: S) -> SessionSummary
    where
        S: Stream<Item = InboundMessage> + Unpin,
    {
        tracing::debug!(connection_id = %self.id, base_path = %self.scope.base_path(), "Session started");
        let mut open: Option<OpenExchange> = None;

        loop {
            if open.is_none() {
                if let Some(message) = self.queued.pop_front() {
                    match self.begin(message).await {
                        Ok(exchange) => open = exchange,
                        Err(_) => break,
                    }
                    continue;
                }
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::debug!(connection_id = %self.id, "Session cancelled");
                    break;
                }

                message = inbound.next() => match message {
                    Some(message) => {
                        if let Err(e) = self.state.transition(SessionState::Decoding) {
                            tracing::debug!(connection_id = %self.id, error = %e, "Exchange still open");
                            self.enqueue(message);
                        } else {
                            match self.begin(message).await {
                                Ok(exchange) => open = exchange,
                                Err(_) => break,
                            }
                        }
                    }
                    None => break,
                },

                event = next_event(&mut open) => {
                    let Some(exchange) = open.as_mut() else {
                        continue;
                    };
                    let result = match event {
                        Some(response) => self.forward(exchange, response).await,
                        None => match open.take() {
                            Some(exchange) => self.finish(exchange).await,
                            None => Ok(()),
                        },
                    };
                    if result.is_err() {
                        break;
                    }
                }
            }
        }

        self.close(open)
    }

    fn set_state(&mut self, to: SessionState) -> Result<(), SessionError> {
        self.state = self.state.transition(to)?;
        if let Some(guard) = &self.guard {
            guard.record_state(self.state);
        }
        Ok(())
    }

    /// Decode, validate and dispatch one message.
    ///
    /// Returns the open exchange, or `None` when the bridge answered itself.
    async fn begin(
        &mut self,
        message: InboundMessage,
    ) -> Result<Option<OpenExchange>, SessionError> {
        self.exchanges += 1;
        let number = self.exchanges;
        let framing = message.framing();
        self.set_state(SessionState::Decoding)?;

        let request = match PseudoRequest::decode_message(message, self.config.max_message_bytes) {
            Ok(request) => request,
            Err(e) => {
                self.reject(number, e.into()).await?;
                self.set_state(SessionState::Idle)?;
                return Ok(None);
            }
        };

        self.set_state(SessionState::Validating)?;
        if let Err(e) = self.scope.validate(&request) {
            self.reject(number, e.into()).await?;
            self.set_state(SessionState::Idle)?;
            return Ok(None);
        }

        self.set_state(SessionState::Dispatched)?;
        tracing::debug!(
            connection_id = %self.id,
            exchange = number,
            framing,
            method = %request.method(),
            path = %request.path(),
            "Dispatching request"
        );

        let cancel = self.cancel.child_token();
        let context = ExchangeContext::new(self.id, number, cancel.clone());
        let events = self.invoker.invoke(request, context);

        Ok(Some(OpenExchange {
            number,
            events,
            encoder: ExchangeEncoder::new(),
            cancel,
            started: Instant::now(),
            status: 0,
        }))
    }

    /// Answer a request the bridge refuses with a single synthetic frame.
    async fn reject(&mut self, number: u64, error: RejectError) -> Result<(), SessionError> {
        tracing::warn!(
            connection_id = %self.id,
            exchange = number,
            reason = error.reason(),
            error = %error,
            "Request rejected"
        );
        metrics::record_rejected(error.reason());

        let started = Instant::now();
        let response = error.to_response();
        let frame = ExchangeEncoder::new().encode(&response);
        metrics::record_frame(frame.kind);
        self.write(frame).await?;
        metrics::record_exchange(response.status, started);
        if let Some(guard) = &self.guard {
            guard.record_exchange();
        }
        Ok(())
    }

    async fn forward(
        &self,
        exchange: &mut OpenExchange,
        mut response: PseudoResponse,
    ) -> Result<(), SessionError> {
        // Status 0 is reserved for continuations; a stream must open with a head.
        if exchange.encoder.frames() == 0 && response.is_continuation() {
            tracing::error!(
                connection_id = %self.id,
                exchange = exchange.number,
                "Pipeline opened with a continuation"
            );
            response = PseudoResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "pipeline produced no response head",
            );
        }
        let frame = exchange.encoder.encode(&response);
        if exchange.encoder.frames() == 1 {
            exchange.status = response.status;
            tracing::debug!(
                connection_id = %self.id,
                exchange = exchange.number,
                status = response.status,
                "Head frame"
            );
        }
        metrics::record_frame(frame.kind);
        self.write(frame).await
    }

    async fn finish(&mut self, mut exchange: OpenExchange) -> Result<(), SessionError> {
        if exchange.encoder.frames() == 0 {
            tracing::error!(
                connection_id = %self.id,
                exchange = exchange.number,
                "Pipeline produced no response"
            );
            let response = PseudoResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "pipeline produced no response",
            );
            self.forward(&mut exchange, response).await?;
        }

        tracing::debug!(
            connection_id = %self.id,
            exchange = exchange.number,
            status = exchange.status,
            frames = exchange.encoder.frames(),
            "Exchange complete"
        );
        metrics::record_exchange(exchange.status, exchange.started);
        if let Some(guard) = &self.guard {
            guard.record_exchange();
        }
        self.set_state(SessionState::Idle)
    }

    fn enqueue(&mut self, message: InboundMessage) {
        if self.queued.len() < self.config.max_queued_requests {
            self.queued.push_back(message);
            return;
        }
        self.dropped += 1;
        metrics::record_rejected("queue_full");
        tracing::warn!(
            connection_id = %self.id,
            queued = self.queued.len(),
            "Request queue full, dropping message"
        );
    }

    async fn write(&self, frame: Frame) -> Result<(), SessionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::WriterClosed),
            result = self.writer.send(frame) => result,
        }
    }

    fn close(mut self, open: Option<OpenExchange>) -> SessionSummary {
        let cancelled_in_flight = open.is_some();
        if let Some(exchange) = open {
            exchange.cancel.cancel();
            tracing::debug!(
                connection_id = %self.id,
                exchange = exchange.number,
                frames = exchange.encoder.frames(),
                "Open exchange cancelled by close"
            );
        }
        // Closed is reachable from every state except itself.
        let _ = self.set_state(SessionState::Closed);
        tracing::debug!(connection_id = %self.id, exchanges = self.exchanges, "Session closed");

        SessionSummary {
            exchanges: self.exchanges,
            cancelled_in_flight,
            dropped_requests: self.dropped,
        }
    }
}

/// Next event of the open exchange; pending forever when none is open.
async fn next_event(open: &mut Option<OpenExchange>) -> Option<PseudoResponse> {
    match open {
        Some(exchange) => exchange.events.next().await,
        None => std::future::pending().await,
    }
}
