//! WebSocket bridge library.
//!
//! Carries HTTP-shaped request/response exchanges over long-lived WebSocket
//! connections, alongside an ordinary HTTP ingress into the same pipeline.

// Core subsystems
pub mod bridge;
pub mod config;
pub mod http;
pub mod net;
pub mod pipeline;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

// Clients and demo resources
pub mod bookstore;
pub mod client;

pub use config::schema::BridgeConfig;
pub use http::BridgeServer;
pub use lifecycle::Shutdown;
