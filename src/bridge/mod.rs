//! WebSocket bridge subsystem.
//!
//! Carries HTTP-shaped exchanges over one long-lived bridge connection.
//!
//! # Data Flow
//! ```text
//! Inbound message (text or binary)
//!     → request.rs (decode request line, headers, body)
//!     → scope.rs (path must stay beneath the connection's base path)
//!     → pipeline::Invoker (external; yields a response stream)
//!     → encoder.rs (first event: status + headers + body; later: body only)
//!     → single per-connection writer
//!
//! Decode or scope failure → error.rs → synthetic 400, pipeline never invoked
//! ```
//!
//! `session.rs` owns the per-connection state machine tying these together.

pub mod encoder;
pub mod error;
pub mod request;
pub mod response;
pub mod scope;
pub mod session;

pub use encoder::{ExchangeEncoder, Frame, FrameKind, FrameWriter};
pub use error::{RejectError, SessionError};
pub use request::{DecodeError, InboundMessage, PseudoRequest};
pub use response::{PseudoResponse, CONTINUATION_STATUS};
pub use scope::{ScopeError, ScopeValidator};
pub use session::{ExchangeSession, SessionState, SessionSummary};
