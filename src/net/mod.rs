//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket upgrade accepted
//!     → connection.rs (slot under the connection cap, unique ID)
//!     → registry entry updated as the session changes state
//!     → guard dropped on close (slot and entry released)
//! ```

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker, SessionInfo};
