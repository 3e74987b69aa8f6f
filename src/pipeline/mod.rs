//! Request-processing pipeline seam.
//!
//! # Data Flow
//! ```text
//! PseudoRequest + ExchangeContext
//!     → Invoker::invoke
//!     → ResponseStream (lazy, possibly unbounded)
//!     → consumed event by event by the bridge or the HTTP ingress
//! ```
//!
//! # Design Decisions
//! - The engine that executes requests sits behind the `Invoker` trait
//! - Responses are a stream, not a callback: dropping the stream stops
//!   emission, and the context's token is cancelled when the connection goes
//! - `Resources` is a thin adapter that resolves method and path, producing
//!   404/405/406 itself

pub mod resources;
pub mod stream;
pub mod template;

use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::bridge::request::PseudoRequest;
use crate::bridge::response::PseudoResponse;
use crate::net::connection::ConnectionId;

pub use resources::{ResourceRequest, Resources, Responder};
pub use stream::Emitter;
pub use template::{PathParams, PathTemplate};

/// The ordered response events of one exchange.
pub type ResponseStream = BoxStream<'static, PseudoResponse>;

/// Executes decoded requests.
pub trait Invoker: Send + Sync + 'static {
    /// Start processing `request`. Must yield at least one event.
    fn invoke(&self, request: PseudoRequest, context: ExchangeContext) -> ResponseStream;
}

/// Per-exchange information handed to the pipeline.
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    connection_id: ConnectionId,
    exchange: u64,
    cancel: CancellationToken,
}

impl ExchangeContext {
    pub fn new(connection_id: ConnectionId, exchange: u64, cancel: CancellationToken) -> Self {
        Self {
            connection_id,
            exchange,
            cancel,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Sequence number of this exchange on its connection, starting at 1.
    pub fn exchange(&self) -> u64 {
        self.exchange
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the exchange is abandoned.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
