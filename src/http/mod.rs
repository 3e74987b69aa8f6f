//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → websocket.rs (upgrade on an endpoint base path → bridge session)
//!     → ingress.rs (any other request → pipeline → streamed response)
//! ```

pub mod ingress;
pub mod server;
pub mod websocket;

pub use server::{AppState, BridgeServer};
